use anyhow::{bail, Context, Result};
use clap::Parser;
use host_scout::logging::init_tracing;
use host_scout::scrapers::ChromeLauncher;
use host_scout::{CityStatus, LogCallback, RunRequest, ScrapeOrchestrator, ScraperConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Settings of the previous run, reused when an argument is omitted
const LAST_USED_FILE: &str = "config.json";

/// Log lines buffered between the worker and the console
const LOG_CHANNEL_CAPACITY: usize = 256;

const MIN_CITY_CHARS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "host-scout", version, about = "Scrape host profiles of a city's listings")]
struct Args {
    /// City to search, e.g. "Jacareí - SP"
    #[arg(long)]
    city: Option<String>,

    /// Number of profiles to scrape in this run
    #[arg(long, allow_hyphen_values = true)]
    count: Option<i64>,

    /// Run Chrome without a window
    #[arg(long, conflicts_with = "show_browser")]
    headless: bool,

    /// Show the Chrome window while scraping
    #[arg(long)]
    show_browser: bool,

    /// Folder for the output table
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print saved progress for the city and exit
    #[arg(long)]
    status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LastUsed {
    city: String,
    target: usize,
    headless: bool,
}

impl LastUsed {
    fn fallback(config: &ScraperConfig) -> Self {
        Self {
            city: config.default_city.clone(),
            target: 10,
            headless: true,
        }
    }

    fn load(path: &Path, config: &ScraperConfig) -> Self {
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::fallback(config);
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            Self::fallback(config)
        })
    }

    fn save(&self, path: &Path) {
        let written = serde_json::to_string_pretty(self)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(path, json).map_err(anyhow::Error::from));
        if let Err(e) = written {
            warn!("Could not save {}: {}", path.display(), e);
        }
    }
}

/// Trimmed city and positive target, or the message to show the operator
fn validate(city: &str, count: i64) -> std::result::Result<(String, usize), String> {
    let city = city.trim();
    if city.chars().count() < MIN_CITY_CHARS {
        return Err(format!("City must have at least {} characters", MIN_CITY_CHARS));
    }
    match usize::try_from(count) {
        Ok(target) if target > 0 => Ok((city.to_string(), target)),
        _ => Err("Profile count must be a positive integer".to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = ScraperConfig::from_env();
    let last_used = LastUsed::load(Path::new(LAST_USED_FILE), &config);

    let city = args.city.unwrap_or(last_used.city);

    if args.status {
        let status = CityStatus::load(&config, &city, args.output.as_deref()).summary();
        println!("📊 {}", status.city);
        println!("   Processed: {}", status.processed);
        println!("   Known URLs: {}", status.discovered);
        println!("   Pending: {}", status.pending);
        return Ok(());
    }

    let count = args.count.unwrap_or(last_used.target as i64);
    let headless = match (args.headless, args.show_browser) {
        (_, true) => false,
        (true, _) => true,
        _ => last_used.headless,
    };

    let (city, target_count) = match validate(&city, count) {
        Ok(valid) => valid,
        Err(message) => bail!(message),
    };

    LastUsed {
        city: city.clone(),
        target: target_count,
        headless,
    }
    .save(Path::new(LAST_USED_FILE));

    info!("🏠 Host Scout");
    info!("City: {} | Target: {} | Headless: {}", city, target_count, headless);

    let request = RunRequest {
        city,
        target_count,
        headless,
        output_folder: args.output,
    };

    let (tx, mut rx) = mpsc::channel::<String>(LOG_CHANNEL_CAPACITY);
    let worker = tokio::task::spawn_blocking(move || {
        let scout = ScrapeOrchestrator::new(config.clone(), ChromeLauncher::new(config));
        let callback: LogCallback = Box::new(move |line: &str| {
            let _ = tx.blocking_send(line.to_string());
        });
        scout.run(&request, Some(callback))
    });

    while let Some(line) = rx.recv().await {
        println!("{}", line);
    }

    let outcome = worker.await.context("Scraper worker panicked")?;
    match outcome {
        Ok(summary) => {
            println!(
                "\n✅ Finished: {} scraped, {} failed, {} rows in table",
                summary.scraped, summary.failed, summary.table_total
            );
            Ok(())
        }
        Err(e) => {
            println!("\n❌ Run failed");
            Err(e).context("Scrape run failed")
        }
    }
}
