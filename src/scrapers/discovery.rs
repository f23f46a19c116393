use crate::codec::{build_search_url, canonicalize_url};
use crate::config::ScraperConfig;
use crate::error::BrowserResult;
use crate::logging::RunLogger;
use crate::scrapers::selectors::{Locator, LISTING_LINKS, NEXT_PAGE, SEARCH_CONTENT};
use crate::scrapers::traits::PageDriver;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Walks the search results of a city and collects listing URLs
pub struct DiscoveryEngine<'a> {
    config: &'a ScraperConfig,
    log: &'a RunLogger,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(config: &'a ScraperConfig, log: &'a RunLogger) -> Self {
        Self { config, log }
    }

    /// Up to `max_new` listing URLs for `city` that are not in `known`.
    ///
    /// Never fails: on a blocked page or a browser error a screenshot is
    /// saved to `screenshot_path` and whatever was found so far is returned.
    pub fn discover<D: PageDriver>(
        &self,
        driver: &mut D,
        city: &str,
        known: &BTreeSet<String>,
        max_new: usize,
        screenshot_path: &Path,
    ) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if max_new == 0 {
            return found;
        }

        self.log.log("--- Searching for new listings ---");
        let search_url = build_search_url(&self.config.search_url_template, city);

        let crawled = self.crawl(driver, &search_url, known, max_new, &mut found, screenshot_path);
        if let Err(e) = crawled {
            self.log.log(format!("Search error: {}", e));
            self.capture(driver, screenshot_path);
        }

        found
    }

    fn crawl<D: PageDriver>(
        &self,
        driver: &mut D,
        search_url: &str,
        known: &BTreeSet<String>,
        max_new: usize,
        found: &mut BTreeSet<String>,
        screenshot_path: &Path,
    ) -> BrowserResult<()> {
        debug!("Opening search page {}", search_url);
        driver.navigate(search_url, self.config.navigation_timeout())?;

        let [main, fallback] = SEARCH_CONTENT;
        if driver.wait_for(main, self.config.element_timeout()).is_err() {
            self.log.log(format!("Warning: {} is slow, waiting for {}...", main, fallback));
            driver.wait_for(fallback, self.config.element_timeout())?;
        }

        if is_blocked(driver) {
            self.log.log("ALERT: captcha or block page detected, stopping search");
            self.capture(driver, screenshot_path);
            return Ok(());
        }

        let mut page = 1;
        loop {
            self.log.log(format!("Scanning search page {}...", page));

            for _ in 0..self.config.scroll_steps {
                driver.scroll_by(self.config.scroll_step_px)?;
                driver.pause(Duration::from_millis(self.config.scroll_pause_ms));
            }

            let html = driver.content()?;
            let before = found.len();
            for url in listing_links(&html, &self.config.site_origin) {
                if found.len() >= max_new {
                    break;
                }
                if !known.contains(&url) {
                    found.insert(url);
                }
            }
            self.log.log(format!("  -> {} new listings on this page", found.len() - before));

            if found.len() >= max_new {
                return Ok(());
            }
            if page >= self.config.max_search_pages {
                self.log.log(format!("  -> Stopped after {} search pages", page));
                return Ok(());
            }

            let Some(next) = self.next_page_control(driver) else {
                self.log.log("  -> No next page, search exhausted");
                return Ok(());
            };

            debug!("Following next page via {}", next);
            driver.click(&next)?;
            driver.wait_for_navigation()?;
            driver.pause(Duration::from_millis(self.config.page_settle_ms));
            page += 1;
        }
    }

    /// First next-page strategy whose control is visible and enabled
    fn next_page_control<D: PageDriver>(&self, driver: &mut D) -> Option<Locator> {
        NEXT_PAGE
            .iter()
            .find(|locator| driver.is_actionable(locator).unwrap_or(false))
            .copied()
    }

    fn capture<D: PageDriver>(&self, driver: &mut D, path: &Path) {
        if let Err(e) = driver.screenshot(path) {
            warn!("Could not save diagnostic screenshot: {}", e);
        }
    }
}

fn is_blocked<D: PageDriver>(driver: &mut D) -> bool {
    let url = driver.current_url().to_lowercase();
    let title = driver.title().unwrap_or_default().to_lowercase();
    url.contains("captcha") || title.contains("challenge")
}

/// Canonical listing URLs linked from a search page, in document order.
///
/// Uses the first link pattern that matches anything.
pub fn listing_links(html: &str, origin: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    for pattern in LISTING_LINKS {
        let Ok(selector) = Selector::parse(pattern) else {
            continue;
        };
        let links: Vec<String> = document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| canonicalize_url(href, origin))
            .collect();
        if !links.is_empty() {
            return links;
        }
    }

    Vec::new()
}
