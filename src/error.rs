use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to download data from {url}: HTTP {status}")]
    FetchFailed { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("The file {} does not exist", .0.display())]
    MissingInputFile(PathBuf),

    #[error("Failed to decompress {}: {source}", .path.display())]
    DecompressionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load pageviews: {0}")]
    LoadFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Another pipeline run holds the lock at {}", .0.display())]
    RunInProgress(PathBuf),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
