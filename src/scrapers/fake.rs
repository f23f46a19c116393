//! In-memory browser serving HTML fixtures.
//!
//! CSS locators are evaluated with `scraper`; XPath locators never match.
//! Clicking an element follows its `href`, or its `data-href` to mimic a
//! script-driven navigation.

use crate::codec::absolutize;
use crate::error::{BrowserError, BrowserResult};
use crate::scrapers::selectors::Locator;
use crate::scrapers::traits::{BrowserLauncher, PageDriver};
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeSite {
    origin: String,
    pages: HashMap<String, String>,
    broken: HashSet<String>,
    fail_launch: bool,
    visits: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    scrolls: Mutex<Vec<i64>>,
    screenshots: Mutex<Vec<PathBuf>>,
}

impl FakeSite {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Serve `html` at `url` (absolute, or relative to the origin)
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(absolutize(url, &self.origin), html.to_string());
        self
    }

    /// Make navigation to `url` fail
    pub fn broken(mut self, url: &str) -> Self {
        self.broken.insert(absolutize(url, &self.origin));
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    /// Locators clicked, as `css:...` / `xpath:...`
    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<i64> {
        self.scrolls.lock().unwrap().clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.screenshots.lock().unwrap().clone()
    }
}

pub struct FakeLauncher {
    pub site: Arc<FakeSite>,
}

impl FakeLauncher {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

impl BrowserLauncher for FakeLauncher {
    type Driver = FakeBrowser;

    fn launch(&self, _headless: bool) -> BrowserResult<FakeBrowser> {
        if self.site.fail_launch {
            return Err(BrowserError::Launch("chrome not installed".to_string()));
        }
        Ok(FakeBrowser::new(self.site.clone()))
    }
}

pub struct FakeBrowser {
    site: Arc<FakeSite>,
    url: String,
    html: String,
}

impl FakeBrowser {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self {
            site,
            url: "about:blank".to_string(),
            html: String::new(),
        }
    }

    fn go(&mut self, url: &str) -> BrowserResult<()> {
        let url = absolutize(url, &self.site.origin);
        self.site.visits.lock().unwrap().push(url.clone());

        if self.site.broken.contains(&url) {
            return Err(BrowserError::Navigation(format!("{}: net::ERR_TIMED_OUT", url)));
        }
        match self.site.pages.get(&url) {
            Some(html) => {
                self.html = html.clone();
                self.url = url;
                Ok(())
            }
            None => Err(BrowserError::Navigation(format!("{}: 404", url))),
        }
    }

    fn first_css<T>(&self, css: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let document = Html::parse_document(&self.html);
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        Some(f(element))
    }

    fn with_first<T>(
        &self,
        locator: &Locator,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> BrowserResult<T> {
        let found = match locator {
            Locator::Css(css) => self.first_css(css, f),
            Locator::XPath(_) => None,
        };
        found.ok_or_else(|| BrowserError::SelectorNotFound(locator.to_string()))
    }
}

fn rendered_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

impl PageDriver for FakeBrowser {
    fn navigate(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.go(url)
    }

    fn wait_for(&mut self, selector: &str, _timeout: Duration) -> BrowserResult<()> {
        self.first_css(selector, |_| ())
            .ok_or_else(|| BrowserError::Timeout(format!("waiting for {}", selector)))
    }

    fn wait_for_navigation(&mut self) -> BrowserResult<()> {
        Ok(())
    }

    fn count(&mut self, locator: &Locator) -> BrowserResult<usize> {
        let document = Html::parse_document(&self.html);
        Ok(match locator {
            Locator::Css(css) => Selector::parse(css)
                .map(|selector| document.select(&selector).count())
                .unwrap_or(0),
            Locator::XPath(_) => 0,
        })
    }

    fn attribute(&mut self, locator: &Locator, name: &str) -> BrowserResult<Option<String>> {
        self.with_first(locator, |el| el.value().attr(name).map(str::to_string))
    }

    fn text(&mut self, locator: &Locator) -> BrowserResult<String> {
        self.with_first(locator, rendered_text)
    }

    fn is_actionable(&mut self, locator: &Locator) -> BrowserResult<bool> {
        Ok(self
            .with_first(locator, |el| {
                el.value().attr("disabled").is_none()
                    && el.value().attr("aria-disabled") != Some("true")
            })
            .unwrap_or(false))
    }

    fn click(&mut self, locator: &Locator) -> BrowserResult<()> {
        let target = self.with_first(locator, |el| {
            el.value()
                .attr("href")
                .or_else(|| el.value().attr("data-href"))
                .map(str::to_string)
        })?;
        self.site.clicks.lock().unwrap().push(locator.to_string());
        match target {
            Some(href) => self.go(&href),
            None => Ok(()),
        }
    }

    fn scroll_by(&mut self, dy: i64) -> BrowserResult<()> {
        self.site.scrolls.lock().unwrap().push(dy);
        Ok(())
    }

    fn content(&mut self) -> BrowserResult<String> {
        Ok(self.html.clone())
    }

    fn current_url(&mut self) -> String {
        self.url.clone()
    }

    fn title(&mut self) -> BrowserResult<String> {
        Ok(self
            .with_first(&Locator::Css("title"), rendered_text)
            .unwrap_or_default())
    }

    fn screenshot(&mut self, path: &Path) -> BrowserResult<()> {
        self.site.screenshots.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn pause(&mut self, _duration: Duration) {}
}
