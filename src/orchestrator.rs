//! Run lifecycle: resume the work queue, top it off with discovery, visit
//! profiles and checkpoint the results.

use crate::codec::{normalize_city, slug};
use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::logging::{LogCallback, RunLogger};
use crate::models::{ProfileRecord, RunRequest, RunSummary};
use crate::scrapers::discovery::DiscoveryEngine;
use crate::scrapers::profile::ProfileExtractor;
use crate::scrapers::traits::{BrowserLauncher, PageDriver};
use crate::store::{self, ScraperPaths};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Saved progress for one city
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityStatus {
    pub city: String,
    pub paths: ScraperPaths,
    pub discovered: BTreeSet<String>,
    pub processed: BTreeSet<String>,
}

impl CityStatus {
    /// Read the URL cache and the output table of `city` from disk
    pub fn load(config: &ScraperConfig, city: &str, output_folder: Option<&Path>) -> Self {
        let city = normalize_city(city, &config.default_city);
        let paths = ScraperPaths::new(config, &slug(&city), output_folder);
        let discovered = store::load_discovered(&paths.discovered_urls);
        let processed = store::load_table(&paths.output_table).processed_urls();

        Self {
            city,
            paths,
            discovered,
            processed,
        }
    }

    /// Discovered URLs without a record, in cache order
    pub fn pending(&self) -> Vec<String> {
        store::pending_urls(&self.discovered, &self.processed)
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            city: self.city.clone(),
            discovered: self.discovered.len(),
            processed: self.processed.len(),
            pending: self.pending().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub city: String,
    pub discovered: usize,
    pub processed: usize,
    pub pending: usize,
}

/// Clears the running flag when the run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ScrapeOrchestrator<L: BrowserLauncher> {
    config: ScraperConfig,
    launcher: L,
    running: AtomicBool,
}

impl<L: BrowserLauncher> ScrapeOrchestrator<L> {
    pub fn new(config: ScraperConfig, launcher: L) -> Self {
        Self {
            config,
            launcher,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Scrape up to `request.target_count` host profiles for one city.
    ///
    /// Log lines go to `callback` as they happen. A failing listing is
    /// skipped and stays pending for the next run; launch and write
    /// failures end the run with an error after the buffer so far has been
    /// handled.
    pub fn run(&self, request: &RunRequest, callback: Option<LogCallback>) -> Result<RunSummary> {
        let log = RunLogger::new(callback);

        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return Err(ScrapeError::InvalidRequest(
                "a run is already in progress".to_string(),
            ));
        };
        if request.target_count == 0 {
            return Err(ScrapeError::InvalidRequest(
                "target count must be greater than zero".to_string(),
            ));
        }

        match self.execute(request, &log) {
            Ok(summary) => {
                log.log(format!(
                    "Done! {} profiles scraped, {} failed. Table now has {} rows.",
                    summary.scraped, summary.failed, summary.table_total
                ));
                Ok(summary)
            }
            Err(e) => {
                error!("Run failed: {}", e);
                log.log(format!("FATAL ERROR: {}", e));
                Err(e)
            }
        }
    }

    fn execute(&self, request: &RunRequest, log: &RunLogger) -> Result<RunSummary> {
        let target = request.target_count;
        let CityStatus {
            city,
            paths,
            mut discovered,
            processed,
        } = CityStatus::load(&self.config, &request.city, request.output_folder.as_deref());
        let mut pending = store::pending_urls(&discovered, &processed);

        log.log(format!("City: {} | Target: {} profiles", city, target));
        log.log(format!(
            "Status: {} processed | {} known URLs | {} pending",
            processed.len(),
            discovered.len(),
            pending.len()
        ));

        let mut driver = self.launcher.launch(request.headless)?;
        let mut summary = RunSummary::default();

        if pending.len() < target {
            let max_new = self.config.discovery_batch(target, pending.len());
            log.log(format!(
                "Only {} pending, searching for up to {} new URLs...",
                pending.len(),
                max_new
            ));

            let found = DiscoveryEngine::new(&self.config, log).discover(
                &mut driver,
                &city,
                &discovered,
                max_new,
                &paths.debug_screenshot,
            );
            summary.newly_discovered = found.len();
            log.log(format!("Discovery finished: {} new URLs", found.len()));

            discovered.extend(found);
            store::save_discovered(&paths.discovered_urls, &discovered)?;
            pending = store::pending_urls(&discovered, &processed);
        }
        summary.discovered_total = discovered.len();

        if pending.is_empty() {
            log.log("Nothing left to scrape for this city");
            summary.table_total = store::flush(&paths.output_table, &[])?;
            return Ok(summary);
        }

        let batch: Vec<String> = pending.into_iter().take(target).collect();
        log.log(format!("--- Scraping {} profiles ---", batch.len()));

        let extractor = ProfileExtractor::new(&self.config, log);
        let mut buffer: Vec<ProfileRecord> = Vec::new();
        let mut rng = rand::thread_rng();

        for (index, url) in batch.iter().enumerate() {
            log.log(format!("[{}/{}]", index + 1, batch.len()));
            summary.attempted += 1;

            match extractor.extract(&mut driver, url) {
                Some(profile) => {
                    let record = ProfileRecord::from_extraction(&city, url, profile, Utc::now());
                    log.log(format!(
                        "  -> Host: {} | Listings: {}",
                        record.host_name, record.host_listings_count
                    ));
                    buffer.push(record);
                    summary.scraped += 1;

                    if buffer.len() >= self.config.checkpoint_size {
                        let total = store::flush(&paths.output_table, &buffer)?;
                        log.log(format!(
                            "Checkpoint: {} profiles saved ({} rows in table)",
                            buffer.len(),
                            total
                        ));
                        buffer.clear();
                    }
                }
                None => summary.failed += 1,
            }

            if index + 1 < batch.len() {
                let delay = rng.gen_range(self.config.delay_range());
                driver.pause(Duration::from_millis(delay));
            }
        }

        summary.table_total = store::flush(&paths.output_table, &buffer)?;
        info!(
            "{} now holds {} rows",
            paths.output_table.display(),
            summary.table_total
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::build_search_url;
    use crate::error::BrowserError;
    use crate::models::NOT_FOUND;
    use crate::scrapers::fake::{FakeLauncher, FakeSite};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const ORIGIN: &str = "https://www.airbnb.com.br";
    const CITY: &str = "Jacareí - SP";

    fn room(id: u32) -> String {
        format!("{ORIGIN}/rooms/{id}")
    }

    /// Search page listing `ids`, each listing linking to host `id`
    fn site_with(ids: &[u32]) -> FakeSite {
        let cards: String = ids
            .iter()
            .map(|id| format!(r#"<a href="/rooms/{id}?check_in=2024-01-01">Casa {id}</a>"#))
            .collect();
        let search = format!(r#"<html><body><div role="main">{cards}</div></body></html>"#);
        let search_url = build_search_url(&ScraperConfig::default().search_url_template, CITY);

        ids.iter().fold(FakeSite::new(ORIGIN).page(&search_url, &search), |site, id| {
            site.page(
                &format!("/rooms/{id}"),
                &format!(
                    r#"<html><body><h1>Casa {id}</h1>
                        <a href="/users/show/{id}">Anfitrião</a></body></html>"#
                ),
            )
            .page(
                &format!("/users/show/{id}"),
                &format!(
                    r#"<html><body><h1>Sobre Host {id}</h1>
                        <p>{id} acomodações</p></body></html>"#
                ),
            )
        })
    }

    fn request(target_count: usize) -> RunRequest {
        RunRequest {
            city: CITY.to_string(),
            target_count,
            headless: true,
            output_folder: None,
        }
    }

    fn orchestrator(dir: &TempDir, site: FakeSite) -> ScrapeOrchestrator<FakeLauncher> {
        ScrapeOrchestrator::new(ScraperConfig::without_delays(dir.path()), FakeLauncher::new(site))
    }

    fn status(dir: &TempDir) -> CityStatus {
        CityStatus::load(&ScraperConfig::without_delays(dir.path()), CITY, None)
    }

    #[test]
    fn test_first_run_discovers_then_scrapes() {
        let dir = TempDir::new().unwrap();
        let scout = orchestrator(&dir, site_with(&[1, 2, 3, 4, 5, 6, 7]));

        let summary = scout.run(&request(5), None).unwrap();

        assert_eq!(summary.newly_discovered, 7);
        assert_eq!(summary.scraped, 5);
        assert_eq!(summary.table_total, 5);

        let paths = ScraperPaths::new(scout.config(), "jacarei-sp", None);
        let table = store::load_table(&paths.output_table);
        assert_eq!(table.processed_urls().len(), 5);
        assert!(store::load_discovered(&paths.discovered_urls).len() >= 5);

        let first = &table.records()[0];
        assert_eq!(first.city, CITY);
        assert_eq!(first.source_url, room(1));
        assert_eq!(first.host_name, "Host 1");
        assert_eq!(first.host_profile_url, format!("{ORIGIN}/users/show/1"));
        assert_eq!(first.host_listings_count, 1);
    }

    #[test]
    fn test_rerun_resumes_pending_only() {
        let dir = TempDir::new().unwrap();
        let scout = orchestrator(&dir, site_with(&[1, 2, 3, 4, 5]));

        scout.run(&request(3), None).unwrap();
        let summary = scout.run(&request(5), None).unwrap();

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.scraped, 2);
        assert_eq!(summary.table_total, 5);
        assert!(status(&dir).pending().is_empty());
    }

    #[test]
    fn test_failed_listing_stays_pending() {
        let dir = TempDir::new().unwrap();
        let site = site_with(&[1, 2, 3]).broken("/rooms/2");
        let scout = orchestrator(&dir, site);

        let summary = scout.run(&request(3), None).unwrap();

        assert_eq!(summary.scraped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(status(&dir).pending(), vec![room(2)]);
    }

    #[test]
    fn test_checkpoints_during_run() {
        let dir = TempDir::new().unwrap();
        let config = ScraperConfig {
            checkpoint_size: 2,
            ..ScraperConfig::without_delays(dir.path())
        };
        let scout = ScrapeOrchestrator::new(config, FakeLauncher::new(site_with(&[1, 2, 3, 4, 5])));

        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let callback: LogCallback =
            Box::new(move |line: &str| sink.lock().unwrap().push(line.to_string()));

        let summary = scout.run(&request(5), Some(callback)).unwrap();
        assert_eq!(summary.table_total, 5);

        let checkpoints = lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains("Checkpoint:"))
            .count();
        assert_eq!(checkpoints, 2);
    }

    #[test]
    fn test_missing_host_is_recorded_with_sentinels() {
        let dir = TempDir::new().unwrap();
        let search_url = build_search_url(&ScraperConfig::default().search_url_template, CITY);
        let site = FakeSite::new(ORIGIN)
            .page(&search_url, r#"<div role="main"><a href="/rooms/9">x</a></div>"#)
            .page("/rooms/9", "<html><body><h1>Quarto</h1></body></html>");
        let scout = orchestrator(&dir, site);

        scout.run(&request(1), None).unwrap();

        let paths = ScraperPaths::new(scout.config(), "jacarei-sp", None);
        let table = store::load_table(&paths.output_table);
        let record = &table.records()[0];
        assert_eq!(record.listing_title, "Quarto");
        assert_eq!(record.host_name, NOT_FOUND);
        assert_eq!(record.host_listings_count, 0);
    }

    #[test]
    fn test_unknown_count_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        let search_url = build_search_url(&ScraperConfig::default().search_url_template, CITY);
        let site = FakeSite::new(ORIGIN)
            .page(&search_url, r#"<div role="main"><a href="/rooms/9">x</a></div>"#)
            .page("/rooms/9", r#"<h1>Quarto</h1><a href="/users/show/3">host</a>"#)
            .page("/users/show/3", "<h1>Sobre Rita</h1>");
        let scout = orchestrator(&dir, site);

        scout.run(&request(1), None).unwrap();

        let paths = ScraperPaths::new(scout.config(), "jacarei-sp", None);
        let record = store::load_table(&paths.output_table).records()[0].clone();
        assert_eq!(record.host_name, "Rita");
        assert_eq!(record.host_listings_count, 1);
    }

    #[test]
    fn test_output_folder_only_moves_table() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("exports");
        let scout = orchestrator(&dir, site_with(&[1]));

        let mut req = request(1);
        req.output_folder = Some(out.clone());
        scout.run(&req, None).unwrap();

        assert!(out.join("perfis_airbnb_jacarei-sp.csv").exists());
        assert!(dir.path().join("data/urls_descobertas_jacarei-sp.txt").exists());
    }

    #[test]
    fn test_launch_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let scout = orchestrator(&dir, site_with(&[1]).failing_launch());

        let err = scout.run(&request(1), None).unwrap_err();
        assert!(matches!(err, ScrapeError::Browser(BrowserError::Launch(_))));
    }

    #[test]
    fn test_zero_target_rejected() {
        let dir = TempDir::new().unwrap();
        let scout = orchestrator(&dir, site_with(&[1]));

        let err = scout.run(&request(0), None).unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidRequest(_)));
        assert!(scout.launcher.site.visits().is_empty());
    }

    #[test]
    fn test_exhausted_city_returns_without_scraping() {
        let dir = TempDir::new().unwrap();
        let scout = orchestrator(&dir, site_with(&[1]));

        scout.run(&request(1), None).unwrap();
        let summary = scout.run(&request(1), None).unwrap();

        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.table_total, 1);
    }
}
