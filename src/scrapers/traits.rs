use crate::error::BrowserResult;
use crate::scrapers::selectors::Locator;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Page-level primitives the scrapers need from a browser.
///
/// Element operations act on the first match of a [`Locator`]; a lookup
/// with no match is an error, callers decide whether that is fatal.
pub trait PageDriver {
    /// Load `url` and wait for the navigation to finish
    fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// Block until `selector` (CSS) matches or `timeout` elapses
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Wait for a navigation triggered by a click to settle
    fn wait_for_navigation(&mut self) -> BrowserResult<()>;

    /// Number of elements matching `locator`, zero when none do
    fn count(&mut self, locator: &Locator) -> BrowserResult<usize>;

    fn attribute(&mut self, locator: &Locator, name: &str) -> BrowserResult<Option<String>>;

    /// Rendered text of the first match
    fn text(&mut self, locator: &Locator) -> BrowserResult<String>;

    /// Whether the first match is visible and enabled
    fn is_actionable(&mut self, locator: &Locator) -> BrowserResult<bool>;

    fn click(&mut self, locator: &Locator) -> BrowserResult<()>;

    fn scroll_by(&mut self, dy: i64) -> BrowserResult<()>;

    /// Full markup of the current document
    fn content(&mut self) -> BrowserResult<String>;

    fn current_url(&mut self) -> String;

    fn title(&mut self) -> BrowserResult<String>;

    /// Save a PNG of the viewport to `path`
    fn screenshot(&mut self, path: &Path) -> BrowserResult<()>;

    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Opens one browser session per run. The session closes when the driver
/// is dropped.
pub trait BrowserLauncher {
    type Driver: PageDriver;

    fn launch(&self, headless: bool) -> BrowserResult<Self::Driver>;
}
