use crate::app::ports::HttpClientPort;
use crate::error::{PipelineError, Result};
use crate::metrics::stages::DataMetrics;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// Download the dump at `url` and write the body to `dest`, overwriting it.
///
/// A non-2xx status fails with `FetchFailed` before anything touches the filesystem.
#[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
pub async fn fetch_dump(http: &dyn HttpClientPort, url: &str, dest: &Path) -> Result<PathBuf> {
    info!("Downloading the data from the source");

    let resp = http.get(url).await?;
    if !resp.is_success() {
        error!(status = resp.status, "Failed to download data");
        return Err(PipelineError::FetchFailed {
            url: url.to_string(),
            status: resp.status,
        });
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, &resp.bytes)?;
    DataMetrics::record_dump_bytes(resp.bytes.len());

    if resp.content_length != resp.bytes.len() as u64 {
        warn!(
            declared = resp.content_length,
            received = resp.bytes.len(),
            "Body length differs from Content-Length; the dump may be truncated"
        );
    }
    info!(
        bytes = resp.bytes.len(),
        content_length = resp.content_length,
        content_type = %resp.content_type,
        "Data Downloaded Successfully!"
    );
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct MockHttp {
        status: u16,
        body: Vec<u8>,
        declared_length: Option<u64>,
        requested: Mutex<Vec<String>>,
    }

    impl MockHttp {
        fn new(status: u16, body: &[u8]) -> Self {
            Self {
                status,
                body: body.to_vec(),
                declared_length: None,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_declared_length(mut self, length: u64) -> Self {
            self.declared_length = Some(length);
            self
        }
    }

    #[async_trait]
    impl HttpClientPort for MockHttp {
        async fn get(&self, url: &str) -> Result<HttpGetResult> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(HttpGetResult {
                status: self.status,
                bytes: self.body.clone(),
                content_type: "application/octet-stream".to_string(),
                content_length: self.declared_length.unwrap_or(self.body.len() as u64),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_writes_body_and_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("data").join("pageviews.gz");
        let http = MockHttp::new(200, b"compressed-bytes");

        let path = fetch_dump(&http, "https://example.org/dump.gz", &dest)
            .await
            .unwrap();

        assert_eq!(path, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"compressed-bytes");
        assert_eq!(
            *http.requested.lock().unwrap(),
            vec!["https://example.org/dump.gz".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pageviews.gz");
        fs::write(&dest, b"stale download that is longer").unwrap();

        fetch_dump(&MockHttp::new(200, b"fresh"), "https://example.org/d.gz", &dest)
            .await
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_length_mismatch_still_writes_received_body() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pageviews.gz");
        let http = MockHttp::new(200, b"short").with_declared_length(4096);

        fetch_dump(&http, "https://example.org/d.gz", &dest)
            .await
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_non_success_status_fails_without_writing() {
        for status in [404u16, 500, 302] {
            let dir = tempdir().unwrap();
            let dest = dir.path().join("data").join("pageviews.gz");

            let err = fetch_dump(&MockHttp::new(status, b"nope"), "https://x/d.gz", &dest)
                .await
                .unwrap_err();

            match err {
                PipelineError::FetchFailed { status: s, url } => {
                    assert_eq!(s, status);
                    assert_eq!(url, "https://x/d.gz");
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!dest.exists());
            assert!(!dest.parent().unwrap().exists());
        }
    }
}
