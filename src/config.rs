use crate::constants::{self, *};
use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Keys accepted in the optional TOML file; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    source_url: Option<String>,
    data_dir: Option<PathBuf>,
    companies: Option<Vec<String>>,
    database_url: Option<String>,
    top_n: Option<usize>,
    #[serde(default)]
    run: RunFileConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunFileConfig {
    retries: Option<u32>,
    retry_delay_secs: Option<u64>,
}

/// Process-wide settings, built once in `main` and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub data_dir: PathBuf,
    pub companies: Vec<String>,
    pub database_url: Option<String>,
    pub top_n: usize,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            companies: constants::default_companies(),
            database_url: None,
            top_n: DEFAULT_TOP_N,
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl Config {
    /// Load defaults, then the TOML file (if present), then environment overrides.
    ///
    /// An explicitly requested file must exist; the default `pageviews.toml` is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!("Loaded config file {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let defaults = Self::default();

        Ok(Self {
            source_url: file.source_url.unwrap_or(defaults.source_url),
            data_dir: file.data_dir.unwrap_or(defaults.data_dir),
            companies: file.companies.unwrap_or(defaults.companies),
            database_url: file.database_url.or(defaults.database_url),
            top_n: file.top_n.unwrap_or(defaults.top_n),
            retries: file.run.retries.unwrap_or(defaults.retries),
            retry_delay: file
                .run
                .retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
        })
    }

    /// Environment wins over the file. The lookup is injected so tests never touch process env.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(DATABASE_URL_ENV) {
            self.database_url = Some(url);
        }
        if let Some(url) = non_empty(SOURCE_URL_ENV) {
            self.source_url = url;
        }
        if let Some(dir) = non_empty(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.companies.iter().all(|c| c.trim().is_empty()) {
            return Err(PipelineError::Config(
                "companies watch-list must contain at least one name".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(PipelineError::Config("top_n must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            PipelineError::Config(format!(
                "{} is not set and no database_url is configured",
                DATABASE_URL_ENV
            ))
        })
    }

    pub fn download_path(&self) -> PathBuf {
        self.data_dir.join(DOWNLOAD_FILE)
    }

    pub fn extracted_path(&self) -> PathBuf {
        self.data_dir.join(EXTRACTED_FILE)
    }

    pub fn filtered_path(&self) -> PathBuf {
        self.data_dir.join(FILTERED_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::default();
        assert_eq!(config.companies.len(), 5);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.retries, 0);
        assert_eq!(config.retry_delay, Duration::from_secs(300));
        assert_eq!(config.download_path(), PathBuf::from("data/pageviews.gz"));
        assert_eq!(config.extracted_path(), PathBuf::from("data/pageviews.txt"));
        assert_eq!(
            config.filtered_path(),
            PathBuf::from("data/filtered_pageviews.csv")
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            companies = ["Netflix", "Spotify"]
            top_n = 1

            [run]
            retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.companies, vec!["Netflix", "Spotify"]);
        assert_eq!(config.top_n, 1);
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(300));
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = Config::from_toml_str("colour = \"blue\"");
        assert!(matches!(result, Err(PipelineError::Toml(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config =
            Config::from_toml_str("database_url = \"from-file.db\"\ndata_dir = \"file-data\"")
                .unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (DATABASE_URL_ENV, "from-env.db"),
            (DATA_DIR_ENV, "  "),
        ]);
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_url().unwrap(), "from-env.db");
        // blank values are ignored
        assert_eq!(config.data_dir, PathBuf::from("file-data"));
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let config = Config::default();
        assert!(matches!(
            config.database_url(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_watch_list() {
        let config = Config {
            companies: vec!["  ".to_string()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
