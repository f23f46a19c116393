//! Host-profile scraper for a property-search site.
//!
//! Listing URLs are discovered through the city search, each listing is
//! followed to its host's profile and the results are merged into a
//! per-city CSV table that later runs resume from.

pub mod codec;
pub mod config;
pub mod count;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod scrapers;
pub mod store;

pub use config::ScraperConfig;
pub use error::{BrowserError, Result, ScrapeError, StoreError};
pub use logging::{LogCallback, RunLogger};
pub use models::{HostProfile, ProfileRecord, RunRequest, RunSummary};
pub use orchestrator::{CityStatus, ScrapeOrchestrator, StatusSummary};
