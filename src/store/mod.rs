//! Per-city files: the discovered-URL cache and the output table.
//!
//! Reads never fail: a missing or unreadable file is an empty starting
//! point. Writes replace the whole file through a temporary sibling and a
//! rename, so a crash mid-write leaves the previous snapshot intact.

use crate::config::ScraperConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::ProfileRecord;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column every output table must carry
pub const KEY_COLUMN: &str = "source_url";

/// File locations for one city
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperPaths {
    pub output_table: PathBuf,
    pub discovered_urls: PathBuf,
    pub debug_screenshot: PathBuf,
}

impl ScraperPaths {
    /// Paths for `slug`.
    ///
    /// Only the output table follows `output_folder`; the URL cache always
    /// stays in the data directory so resuming works whatever folder the
    /// operator picks.
    pub fn new(config: &ScraperConfig, slug: &str, output_folder: Option<&Path>) -> Self {
        let table_dir = output_folder
            .filter(|folder| !folder.as_os_str().is_empty())
            .unwrap_or(&config.data_dir);

        Self {
            output_table: table_dir.join(format!("perfis_airbnb_{}.csv", slug)),
            discovered_urls: config.data_dir.join(format!("urls_descobertas_{}.txt", slug)),
            debug_screenshot: config.debug_dir.join(format!("erro_busca_{}.png", slug)),
        }
    }
}

/// Columns of the output table, in write order
pub const COLUMNS: [&str; 7] = [
    "city",
    "listing_title",
    "host_name",
    "host_profile_url",
    "host_listings_count",
    KEY_COLUMN,
    "scraped_at",
];

/// A row that is on disk but does not decode into a [`ProfileRecord`].
///
/// Its cells are kept in [`COLUMNS`] order and written back untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnparsedRow {
    pub source_url: String,
    pub fields: Vec<String>,
}

/// Every record scraped so far for one city
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    records: Vec<ProfileRecord>,
    unparsed: Vec<UnparsedRow>,
}

impl OutputTable {
    pub fn records(&self) -> &[ProfileRecord] {
        &self.records
    }

    /// Rows kept verbatim because they failed to decode
    pub fn unparsed(&self) -> &[UnparsedRow] {
        &self.unparsed
    }

    pub fn len(&self) -> usize {
        self.records.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs that already have a row, decoded or not
    pub fn processed_urls(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .map(|r| r.source_url.as_str())
            .chain(self.unparsed.iter().map(|r| r.source_url.as_str()))
            .map(str::to_string)
            .collect()
    }

    /// Append `rows` and keep only the last record per `source_url`.
    ///
    /// Survivors keep the position of their last occurrence. An unparsed
    /// row is replaced by a new record for the same URL.
    pub fn merge(&mut self, rows: impl IntoIterator<Item = ProfileRecord>) {
        self.records.extend(rows);

        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (index, record) in self.records.iter().enumerate() {
            last_index.insert(record.source_url.as_str(), index);
        }
        let keep: Vec<bool> = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| last_index.get(record.source_url.as_str()) == Some(&index))
            .collect();

        let replaced: HashSet<String> = last_index.keys().map(|url| url.to_string()).collect();
        self.unparsed.retain(|row| !replaced.contains(&row.source_url));

        let mut flags = keep.into_iter();
        self.records.retain(|_| flags.next().unwrap_or(false));
    }
}

impl FromIterator<ProfileRecord> for OutputTable {
    fn from_iter<I: IntoIterator<Item = ProfileRecord>>(iter: I) -> Self {
        let mut table = Self::default();
        table.merge(iter);
        table
    }
}

/// Discovered URLs saved for a city, empty when the file is absent or unreadable
pub fn load_discovered(path: &Path) -> BTreeSet<String> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
        Err(e) => {
            warn!("Could not read {}, starting from empty: {}", path.display(), e);
            BTreeSet::new()
        }
    }
}

/// Overwrite the URL cache with a sorted snapshot of `urls`
pub fn save_discovered(path: &Path, urls: &BTreeSet<String>) -> StoreResult<()> {
    let mut contents = urls.iter().map(String::as_str).collect::<Vec<_>>().join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }

    replace_file(path, |tmp| {
        fs::write(tmp, contents.as_bytes()).map_err(|source| StoreError::Io {
            path: tmp.to_path_buf(),
            source,
        })
    })?;

    debug!("Saved {} discovered URLs to {}", urls.len(), path.display());
    Ok(())
}

/// Output table on disk; empty when absent, unreadable or keyless.
///
/// Rows that fail to decode are kept as [`UnparsedRow`]s so a later write
/// does not lose them. Rows without a `source_url` are dropped with a
/// warning.
pub fn load_table(path: &Path) -> OutputTable {
    if !path.exists() {
        return OutputTable::default();
    }

    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Could not open {}, starting from empty: {}", path.display(), e);
            return OutputTable::default();
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!("Could not read header of {}: {}", path.display(), e);
            return OutputTable::default();
        }
    };
    let Some(key_index) = headers.iter().position(|column| column == KEY_COLUMN) else {
        warn!("{} has no {} column, treating it as empty", path.display(), KEY_COLUMN);
        return OutputTable::default();
    };

    let mut table = OutputTable::default();
    for (row, result) in reader.records().enumerate() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unreadable row {} of {}: {}", row + 1, path.display(), e);
                continue;
            }
        };

        let source_url = raw.get(key_index).unwrap_or_default().trim();
        if source_url.is_empty() {
            warn!("Skipping row {} of {}: no {}", row + 1, path.display(), KEY_COLUMN);
            continue;
        }

        match raw.deserialize::<ProfileRecord>(Some(&headers)) {
            Ok(record) => table.records.push(record),
            Err(e) => {
                warn!("Keeping row {} of {} as-is: {}", row + 1, path.display(), e);
                let fields = COLUMNS
                    .iter()
                    .map(|column| {
                        headers
                            .iter()
                            .position(|header| header == *column)
                            .and_then(|index| raw.get(index))
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect();
                table.unparsed.push(UnparsedRow {
                    source_url: source_url.to_string(),
                    fields,
                });
            }
        }
    }

    // Later duplicates win, as in a merge
    let records = std::mem::take(&mut table.records);
    table.merge(records);
    table
}

/// Write `table` as the complete contents of `path`.
///
/// Unparsed rows come first, then the records.
pub fn write_table(path: &Path, table: &OutputTable) -> StoreResult<()> {
    replace_file(path, |tmp| {
        let csv_err = |source| StoreError::Csv {
            path: tmp.to_path_buf(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp)
            .map_err(csv_err)?;

        writer.write_record(COLUMNS).map_err(csv_err)?;
        for row in table.unparsed() {
            writer.write_record(&row.fields).map_err(csv_err)?;
        }
        for record in table.records() {
            writer.serialize(record).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: tmp.to_path_buf(),
            source,
        })
    })
}

/// Merge `new_rows` into the table at `path` and write it back.
///
/// The table is re-read first so edits made while the run was going are
/// kept. Returns the table size after the merge; an empty batch writes
/// nothing.
pub fn flush(path: &Path, new_rows: &[ProfileRecord]) -> StoreResult<usize> {
    let mut table = load_table(path);
    if new_rows.is_empty() {
        return Ok(table.len());
    }

    table.merge(new_rows.iter().cloned());
    write_table(path, &table)?;

    info!("Saved {} rows to {} (total: {})", new_rows.len(), path.display(), table.len());
    Ok(table.len())
}

/// Discovered URLs that have no record yet
pub fn pending_urls(discovered: &BTreeSet<String>, processed: &BTreeSet<String>) -> Vec<String> {
    discovered.difference(processed).cloned().collect()
}

fn replace_file<F>(path: &Path, write: F) -> StoreResult<()>
where
    F: FnOnce(&Path) -> StoreResult<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    write(&tmp)?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
