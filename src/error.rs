use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by a [`PageDriver`](crate::scrapers::PageDriver)
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("browser error: {0}")]
    Chrome(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Failures writing the per-city files
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid run request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
