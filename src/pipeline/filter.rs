use crate::constants::CSV_HEADER;
use crate::error::{PipelineError, Result};
use crate::metrics::stages::DataMetrics;
use crate::types::{FilteredRow, PageviewRecord};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Company names to keep, compared case-insensitively against page titles.
///
/// Names are lower-cased and de-duplicated on construction, so a dump line
/// can match at most once however the list was cased. Surrounding whitespace
/// is kept; dump titles never contain any, so `" Google "` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchList {
    names: Vec<String>,
}

impl WatchList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lowered: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().to_lowercase();
            if !name.is_empty() && !lowered.contains(&name) {
                lowered.push(name);
            }
        }
        Self { names: lowered }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Return the lower-cased title when it equals one of the names.
    pub fn matches(&self, page_title: &str) -> Option<String> {
        let title = page_title.to_lowercase();
        self.names.iter().any(|n| *n == title).then_some(title)
    }
}

/// Split a dump line on whitespace; lines with fewer than three fields are rejected.
pub fn parse_line(line: &str) -> Option<PageviewRecord<'_>> {
    let mut fields = line.split_whitespace();
    let domain_code = fields.next()?;
    let page_title = fields.next()?;
    let view_count = fields.next()?;
    Some(PageviewRecord {
        domain_code,
        page_title,
        view_count,
    })
}

/// Result of a filter pass.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub path: PathBuf,
    pub rows: Vec<FilteredRow>,
    pub lines_scanned: u64,
}

/// Keep the rows of `reader` whose title is on the watch-list, in input order.
pub fn filter_lines<R: BufRead>(watch_list: &WatchList, reader: R) -> Result<(Vec<FilteredRow>, u64)> {
    let mut rows = Vec::new();
    let mut lines_scanned = 0u64;

    for raw in reader.split(b'\n') {
        let raw = raw?;
        lines_scanned += 1;
        // dumps are UTF-8 but a stray byte must not abort the scan
        let line = String::from_utf8_lossy(&raw);
        let Some(record) = parse_line(&line) else {
            continue;
        };
        if let Some(company) = watch_list.matches(record.page_title) {
            rows.push(FilteredRow::new(company, record.view_count));
        }
    }

    Ok((rows, lines_scanned))
}

/// Filter the extracted dump at `src` and write `company,pageviews` rows to `dest`.
///
/// The header is written even when nothing matched. Counts are copied verbatim.
/// Values are written bare; a company holding `,` or `"` is CSV-quoted so the
/// loader reads it back intact.
#[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn filter_pageviews(watch_list: &WatchList, src: &Path, dest: &Path) -> Result<FilterOutcome> {
    if !src.exists() {
        return Err(PipelineError::MissingInputFile(src.to_path_buf()));
    }

    let reader = BufReader::new(File::open(src)?);
    let (rows, lines_scanned) = filter_lines(watch_list, reader)?;
    debug!(lines_scanned, matched = rows.len(), "Scanned dump");

    write_filtered(&rows, dest)?;
    DataMetrics::record_filter_pass(lines_scanned, rows.len() as u64);

    info!(rows = rows.len(), "Data transformed!");
    Ok(FilterOutcome {
        path: dest.to_path_buf(),
        rows,
        lines_scanned,
    })
}

fn write_filtered(rows: &[FilteredRow], dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(dest)?;
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([row.company.as_str(), row.pageviews.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
