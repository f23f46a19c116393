//! Ordered lookup strategies.
//!
//! Each table is tried top to bottom and the first entry that matches wins.
//! Entries go from the most semantic hook to the most brittle structural one.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Locator {
    pub fn expression(&self) -> &'static str {
        match self {
            Locator::Css(expr) | Locator::XPath(expr) => expr,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(expr) => write!(f, "css:{}", expr),
            Locator::XPath(expr) => write!(f, "xpath:{}", expr),
        }
    }
}

/// Search results container, with `body` as the slow-page fallback
pub const SEARCH_CONTENT: [&str; 2] = [r#"div[role="main"]"#, "body"];

/// Links to listing detail pages on a search page
pub const LISTING_LINKS: [&str; 2] = [r#"a[href^="/rooms/"]"#, r#"a[href*="/rooms/"]"#];

pub const NEXT_PAGE: [Locator; 5] = [
    Locator::Css(r#"a[aria-label="Próximo"]"#),
    Locator::Css(r#"a[aria-label="Next"]"#),
    Locator::Css(r#"a[aria-label="Seguinte"]"#),
    Locator::XPath("//nav//a[contains(normalize-space(.), 'Próximo')]"),
    Locator::XPath("//nav//a[contains(normalize-space(.), 'Next')]"),
];

/// Close buttons of translation/consent popups on a listing page
pub const DIALOG_CLOSE: [Locator; 4] = [
    Locator::Css("button[aria-label='Fechar']"),
    Locator::Css("button[aria-label='Close']"),
    Locator::Css("div[role='dialog'] button[aria-label*='echar']"),
    Locator::Css("button[data-testid='accept-btn']"),
];

pub const LISTING_TITLE: Locator = Locator::Css("h1");

pub const HOST_LINK: [Locator; 6] = [
    Locator::Css("a[aria-label*='anfitrião']"),
    Locator::Css("a[aria-label*='Anfitrião']"),
    Locator::Css("a[aria-label*='host' i]"),
    Locator::Css("a[href*='/users/show/']"),
    Locator::Css("a[href*='/users/profile/']"),
    Locator::Css("div[class*='_'] > a[href^='/users/']"),
];

/// Host name on the profile page; the generic heading comes last
pub const HOST_NAME: [Locator; 3] = [
    Locator::Css("[data-testid='user-profile-name']"),
    Locator::Css("section h1"),
    Locator::Css("h1"),
];

/// Prefixes the profile heading puts before the host's name
pub const HOST_NAME_PREFIXES: [&str; 6] = [
    "Acomodações de ",
    "Anúncios de ",
    "Listings by ",
    "Conheça ",
    "Sobre ",
    "About ",
];

/// Profile elements whose text states the listing total
pub const LISTINGS_COUNT_TEXT: [Locator; 3] = [
    Locator::Css("[data-testid='listings-count']"),
    Locator::XPath("//div[contains(., 'Mostrando')][contains(., 'ite')]"),
    Locator::XPath("//section[.//h2[contains(., 'Acomodações de') or contains(., 'Listings')]]"),
];

/// Whole-page text, used after the specific elements
pub const PAGE_BODY: Locator = Locator::Css("body");

/// Heading text that marks the host's listings section
pub const LISTINGS_SECTION_MARKERS: [&str; 3] = ["Acomodações de", "Anúncios de", "Listings"];
