use crate::codec::{canonicalize_url, strip_query};
use crate::config::ScraperConfig;
use crate::count::parse_listing_count;
use crate::error::BrowserResult;
use crate::logging::RunLogger;
use crate::models::HostProfile;
use crate::scrapers::selectors::{
    Locator, DIALOG_CLOSE, HOST_LINK, HOST_NAME, HOST_NAME_PREFIXES, LISTINGS_COUNT_TEXT,
    LISTINGS_SECTION_MARKERS, LISTING_TITLE, PAGE_BODY,
};
use crate::scrapers::traits::PageDriver;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static PROFILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/users/(?:show|profile)/\d+").expect("valid regex"));

/// Where the host URL came from
enum HostLink {
    /// Read from the page; the browser is still on the listing
    Found(String),
    /// A click already took the browser to the profile
    Visited(String),
}

/// Visits a listing, follows it to the host profile and reads the host data
pub struct ProfileExtractor<'a> {
    config: &'a ScraperConfig,
    log: &'a RunLogger,
}

impl<'a> ProfileExtractor<'a> {
    pub fn new(config: &'a ScraperConfig, log: &'a RunLogger) -> Self {
        Self { config, log }
    }

    /// Host data for one listing, or `None` when a navigation failed.
    ///
    /// Lookups that fail only leave their field empty.
    pub fn extract<D: PageDriver>(&self, driver: &mut D, listing_url: &str) -> Option<HostProfile> {
        self.log.log(format!("Opening: {}", listing_url));
        match self.try_extract(driver, listing_url) {
            Ok(profile) => Some(profile),
            Err(e) => {
                self.log.log(format!("  -> Error processing URL: {}", e));
                None
            }
        }
    }

    fn try_extract<D: PageDriver>(
        &self,
        driver: &mut D,
        listing_url: &str,
    ) -> BrowserResult<HostProfile> {
        driver.navigate(listing_url, self.config.navigation_timeout())?;
        driver.wait_for(LISTING_TITLE.expression(), self.config.element_timeout())?;
        dismiss_dialogs(driver);

        let mut profile = HostProfile {
            listing_title: read_text(driver, &LISTING_TITLE),
            ..Default::default()
        };

        self.log.log("  -> Looking for the host link...");
        for _ in 0..self.config.host_scroll_steps {
            driver.scroll_by(self.config.host_scroll_px)?;
            driver.pause(Duration::from_millis(self.config.scroll_pause_ms));
        }

        let host_url = match self.find_host_link(driver) {
            Some(HostLink::Visited(url)) => url,
            Some(HostLink::Found(url)) => {
                self.log.log(format!("  -> Going to profile: {}", url));
                driver.navigate(&url, self.config.navigation_timeout())?;
                url
            }
            None => {
                self.log.log("  -> Host profile link NOT found");
                return Ok(profile);
            }
        };
        driver.pause(Duration::from_millis(self.config.profile_settle_ms));

        profile.host_profile_url = Some(canonicalize_url(&host_url, &self.config.site_origin));
        profile.host_name = read_host_name(driver);

        self.log.log("  -> Counting listings...");
        profile.listings_count = read_listings_count(driver);

        Ok(profile)
    }

    /// Host profile URL via the link strategies, a click, then a markup scan
    fn find_host_link<D: PageDriver>(&self, driver: &mut D) -> Option<HostLink> {
        if let Some(locator) = first_present(driver, &HOST_LINK) {
            debug!("Host link matched {}", locator);

            let href = driver
                .attribute(&locator, "href")
                .ok()
                .flatten()
                .filter(|href| !href.trim().is_empty());
            if let Some(href) = href {
                return Some(HostLink::Found(canonicalize_url(&href, &self.config.site_origin)));
            }

            let before = driver.current_url();
            if driver.click(&locator).is_ok() && driver.wait_for_navigation().is_ok() {
                let after = driver.current_url();
                if after != before {
                    return Some(HostLink::Visited(after));
                }
            }
        }

        let html = driver.content().ok()?;
        let path = PROFILE_PATH.find(&html)?.as_str();
        debug!("Host link recovered from markup: {}", path);
        Some(HostLink::Found(canonicalize_url(path, &self.config.site_origin)))
    }
}

/// First locator in `chain` with at least one match
fn first_present<D: PageDriver>(driver: &mut D, chain: &[Locator]) -> Option<Locator> {
    chain
        .iter()
        .find(|locator| driver.count(locator).unwrap_or(0) > 0)
        .copied()
}

fn read_text<D: PageDriver>(driver: &mut D, locator: &Locator) -> Option<String> {
    driver
        .text(locator)
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Close the first visible popup, if any
fn dismiss_dialogs<D: PageDriver>(driver: &mut D) {
    for locator in &DIALOG_CLOSE {
        if driver.is_actionable(locator).unwrap_or(false) && driver.click(locator).is_ok() {
            debug!("Dismissed dialog via {}", locator);
            return;
        }
    }
}

fn read_host_name<D: PageDriver>(driver: &mut D) -> Option<String> {
    HOST_NAME.iter().find_map(|locator| {
        let heading = read_text(driver, locator)?;
        let name = strip_name_prefix(&heading);
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Host name without the heading's localized lead-in ("Sobre Ana" -> "Ana")
pub fn strip_name_prefix(heading: &str) -> &str {
    let heading = heading.trim();
    HOST_NAME_PREFIXES
        .iter()
        .find_map(|prefix| heading.strip_prefix(prefix))
        .unwrap_or(heading)
        .trim()
}

/// Listing cards, then the stated total, then the whole page text
fn read_listings_count<D: PageDriver>(driver: &mut D) -> Option<u32> {
    let cards = driver
        .content()
        .ok()
        .and_then(|html| count_listing_cards(&html));
    if cards.is_some() {
        return cards;
    }

    let stated = LISTINGS_COUNT_TEXT.iter().find_map(|locator| {
        read_text(driver, locator).and_then(|text| parse_listing_count(&text))
    });
    if stated.is_some() {
        return stated;
    }

    read_text(driver, &PAGE_BODY).and_then(|text| parse_listing_count(&text))
}

/// Distinct listing links inside the host's listings section.
///
/// `None` when there is no such section or it has no cards.
pub fn count_listing_cards(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let section = Selector::parse("section").ok()?;
    let card = Selector::parse(r#"a[href*="/rooms/"]"#).ok()?;

    let listings = document.select(&section).find(|section| {
        let text: String = section.text().collect();
        LISTINGS_SECTION_MARKERS.iter().any(|marker| text.contains(marker))
    })?;

    let distinct: HashSet<&str> = listings
        .select(&card)
        .filter_map(|a| a.value().attr("href"))
        .map(strip_query)
        .collect();

    match distinct.len() {
        0 => None,
        n => u32::try_from(n).ok(),
    }
}
