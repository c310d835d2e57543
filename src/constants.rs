//! Defaults shared by the config layer, the CLI and the stages

// Source dump for 2024-10-10 16:00 UTC
pub const DEFAULT_SOURCE_URL: &str =
    "https://dumps.wikimedia.org/other/pageviews/2024/2024-10/pageviews-20241010-160000.gz";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_CONFIG_FILE: &str = "pageviews.toml";

// Artifact file names, relative to the data dir
pub const DOWNLOAD_FILE: &str = "pageviews.gz";
pub const EXTRACTED_FILE: &str = "pageviews.txt";
pub const FILTERED_FILE: &str = "filtered_pageviews.csv";
pub const LOCK_FILE: &str = ".pipeline.lock";

pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

/// Header row of the filtered artifact
pub const CSV_HEADER: [&str; 2] = ["company", "pageviews"];

// Environment variables
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const SOURCE_URL_ENV: &str = "PAGEVIEWS_SOURCE_URL";
pub const DATA_DIR_ENV: &str = "PAGEVIEWS_DATA_DIR";
pub const METRICS_ADDR_ENV: &str = "PAGEVIEWS_METRICS_ADDR";

/// Get the default watch-list of company page titles
pub fn default_companies() -> Vec<String> {
    ["Google", "Facebook", "Amazon", "Apple", "Microsoft"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
