//! Run-wide settings.
//!
//! Every policy knob the engine uses lives in [`ScraperConfig`]. The
//! orchestrator receives one at construction, so tests can run several
//! configurations side by side.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// City used when the operator leaves the field blank
    pub default_city: String,
    /// Scheme and host of the target site, used to absolutize relative links
    pub site_origin: String,
    /// Search endpoint with a `{city}` placeholder
    pub search_url_template: String,

    /// Internal directory for tables and the URL cache
    pub data_dir: PathBuf,
    /// Directory for diagnostic screenshots
    pub debug_dir: PathBuf,

    /// Flush the row buffer after this many successful profiles
    pub checkpoint_size: usize,
    /// Extra URLs requested from discovery on top of the deficit
    pub discovery_margin: usize,
    /// Minimum batch requested from discovery
    pub discovery_floor: usize,
    /// Upper bound on search pages visited in one discovery pass
    pub max_search_pages: usize,

    /// Scroll steps per search page to trigger lazy loading
    pub scroll_steps: usize,
    /// Pixels scrolled per step
    pub scroll_step_px: i64,
    /// Pause between scroll steps
    pub scroll_pause_ms: u64,
    /// Scroll steps on a listing page to bring the host card into view
    pub host_scroll_steps: usize,
    /// Pixels scrolled per listing-page step
    pub host_scroll_px: i64,
    /// Pause after activating the next-page control
    pub page_settle_ms: u64,
    /// Pause after opening a host profile
    pub profile_settle_ms: u64,

    pub navigation_timeout_secs: u64,
    pub element_timeout_secs: u64,

    /// Courtesy delay between profile visits, milliseconds
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,

    /// Request URL suffixes that are aborted to speed up page loads
    pub blocked_extensions: Vec<String>,
    pub user_agent: String,
    pub window_size: (u32, u32),
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            default_city: "Jacareí - SP".to_string(),
            site_origin: "https://www.airbnb.com.br".to_string(),
            search_url_template: "https://www.airbnb.com.br/s/{city}/homes".to_string(),
            data_dir: PathBuf::from("data"),
            debug_dir: PathBuf::from("debug"),
            checkpoint_size: 10,
            discovery_margin: 10,
            discovery_floor: 20,
            max_search_pages: 15,
            scroll_steps: 5,
            scroll_step_px: 1000,
            scroll_pause_ms: 1000,
            host_scroll_steps: 2,
            host_scroll_px: 3000,
            page_settle_ms: 3000,
            profile_settle_ms: 3000,
            navigation_timeout_secs: 60,
            element_timeout_secs: 20,
            delay_min_ms: 2000,
            delay_max_ms: 4000,
            blocked_extensions: ["png", "jpg", "jpeg", "gif", "webp", "svg", "mp4", "woff", "woff2"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            window_size: (1280, 720),
        }
    }
}

impl ScraperConfig {
    /// Defaults with environment overrides.
    ///
    /// Supports `SCOUT_DATA_DIR`, `SCOUT_DEBUG_DIR`, `SCOUT_CHECKPOINT_SIZE`,
    /// `SCOUT_DEFAULT_CITY`, `SCOUT_DELAY_MIN_MS` and `SCOUT_DELAY_MAX_MS`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("SCOUT_DATA_DIR") {
            debug!("Override data_dir from env: {}", dir);
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SCOUT_DEBUG_DIR") {
            debug!("Override debug_dir from env: {}", dir);
            config.debug_dir = PathBuf::from(dir);
        }
        if let Ok(city) = std::env::var("SCOUT_DEFAULT_CITY") {
            if !city.trim().is_empty() {
                config.default_city = city.trim().to_string();
            }
        }
        if let Some(size) = env_number::<usize>("SCOUT_CHECKPOINT_SIZE") {
            if size > 0 {
                debug!("Override checkpoint_size from env: {}", size);
                config.checkpoint_size = size;
            }
        }
        if let Some(ms) = env_number::<u64>("SCOUT_DELAY_MIN_MS") {
            config.delay_min_ms = ms;
        }
        if let Some(ms) = env_number::<u64>("SCOUT_DELAY_MAX_MS") {
            config.delay_max_ms = ms;
        }

        config
    }

    /// Config for tests and dry runs: no pauses, everything under `root`.
    pub fn without_delays(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            debug_dir: root.join("debug"),
            scroll_pause_ms: 0,
            page_settle_ms: 0,
            profile_settle_ms: 0,
            delay_min_ms: 0,
            delay_max_ms: 0,
            ..Self::default()
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    /// Courtesy delay bounds, tolerating a swapped min/max
    pub fn delay_range(&self) -> RangeInclusive<u64> {
        let low = self.delay_min_ms.min(self.delay_max_ms);
        let high = self.delay_min_ms.max(self.delay_max_ms);
        low..=high
    }

    /// How many new URLs to ask discovery for, given the current shortfall
    pub fn discovery_batch(&self, target: usize, pending: usize) -> usize {
        let deficit = target.saturating_sub(pending);
        (deficit + self.discovery_margin).max(self.discovery_floor)
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_batch_has_floor() {
        let config = ScraperConfig::default();
        assert_eq!(config.discovery_batch(5, 0), 20);
        assert_eq!(config.discovery_batch(5, 4), 20);
    }

    #[test]
    fn discovery_batch_adds_margin_above_floor() {
        let config = ScraperConfig::default();
        assert_eq!(config.discovery_batch(50, 10), 50);
    }

    #[test]
    fn delay_range_is_ordered() {
        let config = ScraperConfig {
            delay_min_ms: 4000,
            delay_max_ms: 2000,
            ..ScraperConfig::default()
        };
        assert_eq!(config.delay_range(), 2000..=4000);
    }

    #[test]
    fn without_delays_roots_directories() {
        let config = ScraperConfig::without_delays("/tmp/run");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/run/data"));
        assert_eq!(config.debug_dir, PathBuf::from("/tmp/run/debug"));
        assert_eq!(config.delay_range(), 0..=0);
    }
}
