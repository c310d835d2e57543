use crate::error::{PipelineError, Result};
use flate2::read::MultiGzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// Outcome of the extract stage.
///
/// Both variants carry the destination path; with `SourceMissing` that file
/// was neither created nor touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Written(PathBuf),
    SourceMissing(PathBuf),
}

impl Extracted {
    pub fn path(&self) -> &Path {
        match self {
            Extracted::Written(p) | Extracted::SourceMissing(p) => p,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Extracted::Written(_))
    }
}

/// Decompress the gzip file at `src` into `dest`.
///
/// A missing `src` is logged and reported as `SourceMissing`, not as an error.
/// A zero-byte `src` extracts to an empty file. A corrupt stream fails with `DecompressionFailed` and leaves `dest` untouched.
#[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn extract_dump(src: &Path, dest: &Path) -> Result<Extracted> {
    if !src.exists() {
        error!("The file {} does not exist.", src.display());
        return Ok(Extracted::SourceMissing(dest.to_path_buf()));
    }

    let file = File::open(src)?;
    let mut decoded = Vec::new();
    // the decoder rejects an empty input outright; treat it as an empty dump
    if file.metadata()?.len() > 0 {
        MultiGzDecoder::new(file)
            .read_to_end(&mut decoded)
            .map_err(|source| PipelineError::DecompressionFailed {
                path: src.to_path_buf(),
                source,
            })?;
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, &decoded)?;

    info!(bytes = decoded.len(), "Extracted content to {}", dest.display());
    Ok(Extracted::Written(dest.to_path_buf()))
}
