use crate::config::ScraperConfig;
use crate::error::{BrowserError, BrowserResult};
use crate::scrapers::selectors::Locator;
use crate::scrapers::traits::{BrowserLauncher, PageDriver};
use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::FailRequest;
use headless_chrome::protocol::cdp::Network::ErrorReason;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// JS run against an element to decide whether a click would land
const ACTIONABLE_JS: &str = r#"function() {
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden'
        && !this.disabled
        && this.getAttribute('aria-disabled') !== 'true';
}"#;

fn chrome_err(context: &'static str) -> impl Fn(anyhow::Error) -> BrowserError {
    move |e| BrowserError::Chrome(format!("{}: {:#}", context, e))
}

/// Launches headless Chrome sessions configured for scraping
pub struct ChromeLauncher {
    config: ScraperConfig,
}

impl ChromeLauncher {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Driver = ChromePage;

    fn launch(&self, headless: bool) -> BrowserResult<ChromePage> {
        info!("Launching Chrome (headless: {})...", headless);

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some(self.config.window_size))
            .build()
            .map_err(|e| BrowserError::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(options).map_err(|e| {
            BrowserError::Launch(format!("Failed to launch Chrome browser: {:#}", e))
        })?;

        let tab = browser.new_tab().map_err(chrome_err("Failed to open tab"))?;
        tab.set_default_timeout(self.config.navigation_timeout());
        tab.set_user_agent(&self.config.user_agent, Some("pt-BR,pt;q=0.9,en;q=0.8"), None)
            .map_err(chrome_err("Failed to set user agent"))?;

        block_heavy_resources(&tab, &self.config.blocked_extensions)?;

        Ok(ChromePage {
            tab,
            _browser: browser,
        })
    }
}

/// Abort image, media and font requests; the scrapers only read markup
fn block_heavy_resources(tab: &Arc<Tab>, extensions: &[String]) -> BrowserResult<()> {
    if extensions.is_empty() {
        return Ok(());
    }

    let suffixes: Vec<String> = extensions
        .iter()
        .map(|ext| format!(".{}", ext.trim_start_matches('.').to_lowercase()))
        .collect();

    tab.enable_fetch(None, None)
        .map_err(chrome_err("Failed to enable request interception"))?;
    tab.enable_request_interception(Arc::new(
        move |_transport: Arc<Transport>, _session: SessionId, event: RequestPausedEvent| {
            let url = event.params.request.url.to_lowercase();
            let path = url.split(['?', '#']).next().unwrap_or_default();

            if suffixes.iter().any(|suffix| path.ends_with(suffix.as_str())) {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: event.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    ))
    .map_err(chrome_err("Failed to install request interceptor"))?;

    debug!("Blocking requests ending in {:?}", extensions);
    Ok(())
}

/// One Chrome tab; dropping it closes the browser process
pub struct ChromePage {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl ChromePage {
    fn first(&self, locator: &Locator) -> BrowserResult<Element<'_>> {
        let found = match locator {
            Locator::Css(css) => self.tab.find_element(css),
            Locator::XPath(xpath) => self.tab.find_element_by_xpath(xpath),
        };
        found.map_err(|_| BrowserError::SelectorNotFound(locator.to_string()))
    }
}

impl PageDriver for ChromePage {
    fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| BrowserError::Navigation(format!("{}: {:#}", url, e)))?;
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| BrowserError::Timeout(format!("waiting for {}", selector)))
    }

    fn wait_for_navigation(&mut self) -> BrowserResult<()> {
        self.tab
            .wait_until_navigated()
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(format!("{:#}", e)))
    }

    fn count(&mut self, locator: &Locator) -> BrowserResult<usize> {
        let found = match locator {
            Locator::Css(css) => self.tab.find_elements(css),
            Locator::XPath(xpath) => self.tab.find_elements_by_xpath(xpath),
        };
        // headless_chrome reports "no match" as an error
        Ok(found.map(|elements| elements.len()).unwrap_or(0))
    }

    fn attribute(&mut self, locator: &Locator, name: &str) -> BrowserResult<Option<String>> {
        let element = self.first(locator)?;
        element
            .get_attribute_value(name)
            .map_err(chrome_err("Failed to read attribute"))
    }

    fn text(&mut self, locator: &Locator) -> BrowserResult<String> {
        let element = self.first(locator)?;
        element
            .get_inner_text()
            .map_err(chrome_err("Failed to read text"))
    }

    fn is_actionable(&mut self, locator: &Locator) -> BrowserResult<bool> {
        let element = match self.first(locator) {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        let result = element
            .call_js_fn(ACTIONABLE_JS, vec![], false)
            .map_err(chrome_err("Failed to probe element"))?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn click(&mut self, locator: &Locator) -> BrowserResult<()> {
        let element = self.first(locator)?;
        element.click().map_err(chrome_err("Failed to click"))?;
        Ok(())
    }

    fn scroll_by(&mut self, dy: i64) -> BrowserResult<()> {
        self.tab
            .evaluate(&format!("window.scrollBy(0, {})", dy), false)
            .map_err(chrome_err("Failed to scroll"))?;
        Ok(())
    }

    fn content(&mut self) -> BrowserResult<String> {
        self.tab
            .get_content()
            .map_err(chrome_err("Failed to read page HTML"))
    }

    fn current_url(&mut self) -> String {
        self.tab.get_url()
    }

    fn title(&mut self) -> BrowserResult<String> {
        self.tab.get_title().map_err(chrome_err("Failed to read title"))
    }

    fn screenshot(&mut self, path: &Path) -> BrowserResult<()> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(chrome_err("Failed to capture screenshot"))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, png)?;
        info!("Saved screenshot to {}", path.display());
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        debug!("Closing browser session");
        let _ = self.tab.close(false);
    }
}
