use crate::app::ports::{HttpClientPort, StoreConnector};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::pipeline::aggregate::{top_companies, DumpHour};
use crate::pipeline::extract::{extract_dump, Extracted};
use crate::pipeline::fetch::fetch_dump;
use crate::pipeline::filter::{filter_pageviews, WatchList};
use crate::pipeline::load::load_pageviews;
use crate::types::CompanyPageviews;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// The five stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Filter,
    Load,
    Analyze,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::Extract,
        Stage::Filter,
        Stage::Load,
        Stage::Analyze,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Filter => "filter",
            Stage::Load => "load",
            Stage::Analyze => "analyze",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Retry policy applied to each stage independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
}

impl RunPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.retries,
            retry_delay: config.retry_delay,
        }
    }
}

/// Exclusive advisory lock on the run lock file, held for the duration of a run.
///
/// The OS releases the lock when the process exits, however it exits, so a
/// file left behind by a killed run never blocks the next one.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(PipelineError::RunInProgress(path.to_path_buf()));
            }
            return Err(e.into());
        }
        // holder info for whoever finds the file; the lock itself is what counts
        file.set_len(0)?;
        writeln!(file, "pid={} started_at={}", std::process::id(), Utc::now().to_rfc3339())?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub started_at: DateTime<Utc>,
    pub download_path: PathBuf,
    pub extracted_path: PathBuf,
    pub filtered_path: PathBuf,
    pub rows_filtered: usize,
    pub rows_loaded: usize,
    pub ranking: Vec<CompanyPageviews>,
    pub duration_secs: f64,
}

/// Runs fetch → extract → filter → load → analyze, aborting at the first failure.
pub struct Pipeline<'a> {
    config: &'a Config,
    http: &'a dyn HttpClientPort,
    store: &'a dyn StoreConnector,
    policy: RunPolicy,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        http: &'a dyn HttpClientPort,
        store: &'a dyn StoreConnector,
    ) -> Self {
        Self {
            config,
            http,
            store,
            policy: RunPolicy::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: RunPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[instrument(skip(self), fields(source = %self.config.source_url))]
    pub async fn run(&self) -> Result<PipelineResult> {
        let _lock = RunLock::acquire(&self.config.lock_path())?;
        let started_at = Utc::now();
        let t_run = Instant::now();
        info!("🚀 Starting pageviews pipeline");

        let http = self.http;
        let store = self.store;
        let url = self.config.source_url.as_str();
        let download_dest = self.config.download_path();
        let extract_dest = self.config.extracted_path();
        let filter_dest = self.config.filtered_path();
        let watch_list = WatchList::new(&self.config.companies);
        let top_n = self.config.top_n;
        let dump_hour = DumpHour::from_url(url);

        let (download_ref, extract_ref, filter_ref) =
            (download_dest.as_path(), extract_dest.as_path(), filter_dest.as_path());
        let watch_ref = &watch_list;

        let download_path = self
            .attempt(Stage::Fetch, move || async move {
                fetch_dump(http, url, download_ref).await
            })
            .await?;

        let download_src = download_path.as_path();
        let extracted = self
            .attempt(Stage::Extract, move || async move {
                extract_dump(download_src, extract_ref)
            })
            .await?;
        let extracted_path = match extracted {
            Extracted::Written(path) => path,
            Extracted::SourceMissing(_) => {
                error!("Aborting: nothing was extracted");
                return Err(PipelineError::MissingInputFile(download_path));
            }
        };

        let extracted_src = extracted_path.as_path();
        let filtered = self
            .attempt(Stage::Filter, move || async move {
                filter_pageviews(watch_ref, extracted_src, filter_ref)
            })
            .await?;

        let filtered_src = filtered.path.as_path();
        let rows_loaded = self
            .attempt(Stage::Load, move || async move {
                load_pageviews(store, filtered_src)
            })
            .await?;

        let hour_ref = dump_hour.as_ref();
        let ranking = self
            .attempt(Stage::Analyze, move || async move {
                top_companies(store, top_n, hour_ref)
            })
            .await?;

        let duration_secs = t_run.elapsed().as_secs_f64();
        info!(duration_secs, "✅ Pipeline finished");

        Ok(PipelineResult {
            started_at,
            download_path,
            extracted_path,
            rows_filtered: filtered.rows.len(),
            filtered_path: filtered.path,
            rows_loaded,
            ranking,
            duration_secs,
        })
    }

    /// Run one stage under the retry policy, recording stage metrics per attempt.
    async fn attempt<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let t_stage = Instant::now();
            match op().await {
                Ok(value) => {
                    StageMetrics::record_success(stage.name(), t_stage.elapsed().as_secs_f64());
                    return Ok(value);
                }
                Err(e) => {
                    StageMetrics::record_failure(stage.name(), t_stage.elapsed().as_secs_f64());
                    if attempt >= self.policy.retries {
                        error!(%stage, "Stage failed: {}", e);
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        %stage,
                        attempt,
                        retries = self.policy.retries,
                        "Stage failed, retrying in {:?}: {}",
                        self.policy.retry_delay,
                        e
                    );
                    StageMetrics::record_retry(stage.name());
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use crate::infra::sqlite_store::SharedConnector;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    /// Fails with the given status a set number of times, then serves `body`.
    struct FlakyHttp {
        failures_left: AtomicU32,
        calls: AtomicU32,
        body: Vec<u8>,
    }

    impl FlakyHttp {
        fn new(failures: u32, body: Vec<u8>) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
                body,
            }
        }
    }

    #[async_trait]
    impl HttpClientPort for FlakyHttp {
        async fn get(&self, _url: &str) -> Result<HttpGetResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            Ok(HttpGetResult {
                status: if failing { 503 } else { 200 },
                bytes: self.body.clone(),
                content_type: "application/octet-stream".to_string(),
                content_length: self.body.len() as u64,
            })
        }
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn test_config(data_dir: &Path) -> Config {
        Config {
            data_dir: data_dir.to_path_buf(),
            companies: vec!["Google".to_string(), "Facebook".to_string()],
            ..Config::default()
        }
    }

    fn no_delay(retries: u32) -> RunPolicy {
        RunPolicy {
            retries,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["fetch", "extract", "filter", "load", "analyze"]);
    }

    #[test]
    fn test_run_lock_is_exclusive_and_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".pipeline.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert!(matches!(
            RunLock::acquire(&path),
            Err(PipelineError::RunInProgress(_))
        ));
        drop(lock);

        assert!(RunLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_lock_file_left_by_killed_run_does_not_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".pipeline.lock");
        fs::write(&path, "pid=999999 started_at=2024-10-10T16:00:00+00:00\n").unwrap();

        let lock = RunLock::acquire(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(&format!("pid={} ", std::process::id())));
        drop(lock);
    }

    #[tokio::test]
    async fn test_run_produces_ranking() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let http = FlakyHttp::new(0, gzip("12 google 500 -\n12 facebook 700 -\n13 google 900 -\n"));
        let store = SharedConnector::open_in_memory().unwrap();

        let result = Pipeline::new(&config, &http, &store).run().await.unwrap();

        assert_eq!(result.rows_filtered, 3);
        assert_eq!(result.rows_loaded, 3);
        assert_eq!(result.ranking[0], CompanyPageviews::new("google", 900));
        assert!(RunLock::acquire(&config.lock_path()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_retry_by_default() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let http = FlakyHttp::new(1, gzip("en google 1 0\n"));
        let store = SharedConnector::open_in_memory().unwrap();

        let err = Pipeline::new(&config, &http, &store)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::FetchFailed { status: 503, .. }));
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
        // downstream stages never ran
        assert!(!config.extracted_path().exists());
        assert!(RunLock::acquire(&config.lock_path()).is_ok());
    }

    #[tokio::test]
    async fn test_retry_policy_retries_failed_stage() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let http = FlakyHttp::new(2, gzip("en facebook 12 0\n"));
        let store = SharedConnector::open_in_memory().unwrap();

        let result = Pipeline::new(&config, &http, &store)
            .with_policy(no_delay(2))
            .run()
            .await
            .unwrap();

        assert_eq!(http.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.ranking, vec![CompanyPageviews::new("facebook", 12)]);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let _held = RunLock::acquire(&config.lock_path()).unwrap();
        let http = FlakyHttp::new(0, gzip(""));
        let store = SharedConnector::open_in_memory().unwrap();

        let err = Pipeline::new(&config, &http, &store)
            .with_policy(no_delay(0))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RunInProgress(_)));
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_proceeds_over_stale_lock_file() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(config.lock_path(), "pid=999999 started_at=2024-10-10T16:00:00+00:00\n").unwrap();
        let http = FlakyHttp::new(0, gzip("en google 5 0\n"));
        let store = SharedConnector::open_in_memory().unwrap();

        let result = Pipeline::new(&config, &http, &store).run().await.unwrap();

        assert_eq!(result.ranking, vec![CompanyPageviews::new("google", 5)]);
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_download_yields_empty_ranking() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let http = FlakyHttp::new(0, Vec::new());
        let store = SharedConnector::open_in_memory().unwrap();

        let result = Pipeline::new(&config, &http, &store).run().await.unwrap();

        assert_eq!(result.rows_filtered, 0);
        assert_eq!(result.rows_loaded, 0);
        assert!(result.ranking.is_empty());
        assert_eq!(
            fs::read_to_string(config.filtered_path()).unwrap(),
            "company,pageviews\n"
        );
    }
}
