pub mod browser;
pub mod discovery;
pub mod profile;
pub mod selectors;
pub mod traits;

#[cfg(test)]
pub mod fake;

pub use browser::{ChromeLauncher, ChromePage};
pub use discovery::DiscoveryEngine;
pub use profile::ProfileExtractor;
pub use selectors::Locator;
pub use traits::{BrowserLauncher, PageDriver};
