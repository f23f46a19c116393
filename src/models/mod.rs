use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Placeholder written when a text field could not be extracted
pub const NOT_FOUND: &str = "not found";

/// Naive layouts a spreadsheet may leave behind after re-saving the table
const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// RFC 3339, or one of the naive layouts read as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp: {}", raw)))
}

/// One scraped row of the output table, keyed by `source_url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub city: String,
    pub listing_title: String,
    pub host_name: String,
    pub host_profile_url: String,
    pub host_listings_count: u32,
    pub source_url: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub scraped_at: DateTime<Utc>,
}

/// What the extractor could recover from one listing and its host profile.
///
/// Fields that could not be read hold `None`; turning them into table values
/// is the caller's decision (see [`ProfileRecord::from_extraction`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostProfile {
    pub listing_title: Option<String>,
    pub host_name: Option<String>,
    pub host_profile_url: Option<String>,
    pub listings_count: Option<u32>,
}

impl HostProfile {
    /// Listing count to record.
    ///
    /// An unknown count with a confirmed host name means the host has at least
    /// the listing we came from.
    pub fn resolved_listings_count(&self) -> u32 {
        match (self.listings_count, &self.host_name) {
            (Some(count), _) => count,
            (None, Some(_)) => 1,
            (None, None) => 0,
        }
    }
}

impl ProfileRecord {
    pub fn from_extraction(
        city: &str,
        source_url: &str,
        profile: HostProfile,
        scraped_at: DateTime<Utc>,
    ) -> Self {
        let host_listings_count = profile.resolved_listings_count();
        let or_sentinel = |value: Option<String>| value.unwrap_or_else(|| NOT_FOUND.to_string());

        Self {
            city: city.to_string(),
            listing_title: or_sentinel(profile.listing_title),
            host_name: or_sentinel(profile.host_name),
            host_profile_url: or_sentinel(profile.host_profile_url),
            host_listings_count,
            source_url: source_url.to_string(),
            scraped_at,
        }
    }
}

/// Parameters of one scraping run, as collected by the front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Free-text city, normalized before use
    pub city: String,
    /// How many profiles to scrape in this run
    pub target_count: usize,
    /// Run Chrome without a window
    pub headless: bool,
    /// Folder for the output table; the URL cache stays in the data directory
    pub output_folder: Option<PathBuf>,
}

/// Counters reported back when a run finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub discovered_total: usize,
    pub newly_discovered: usize,
    pub attempted: usize,
    pub scraped: usize,
    pub failed: usize,
    pub table_total: usize,
}
