use crate::app::ports::StoreConnector;
use crate::error::{PipelineError, Result};
use crate::metrics::stages::DataMetrics;
use crate::types::FilteredRow;
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, instrument};

pub const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS pageviews (
        company TEXT,
        pageviews INTEGER
    );
"#;

const INSERT_SQL: &str = "INSERT INTO pageviews (company, pageviews) VALUES (?1, ?2)";

/// Create the `pageviews` table when absent; an existing table is left as is.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLE_SQL)?;
    Ok(())
}

/// Read the filtered CSV (header row skipped) into memory.
pub fn read_filtered(path: &Path) -> Result<Vec<FilteredRow>> {
    if !path.exists() {
        return Err(PipelineError::MissingInputFile(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows: Vec<FilteredRow> = Vec::new();
    for record in reader.deserialize::<FilteredRow>() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Insert every row in one transaction and return how many were inserted.
///
/// Nothing is committed unless every row inserts; the transaction rolls back on drop.
pub fn insert_rows(conn: &mut Connection, rows: &[FilteredRow]) -> Result<usize> {
    ensure_schema(conn)?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for (i, row) in rows.iter().enumerate() {
            let pageviews: i64 = row.pageviews.parse().map_err(|_| {
                PipelineError::LoadFailed(format!(
                    "row {}: pageviews '{}' for '{}' is not an integer",
                    i + 1,
                    row.pageviews,
                    row.company
                ))
            })?;
            stmt.execute(params![row.company, pageviews]).map_err(|e| {
                PipelineError::LoadFailed(format!("row {}: insert failed: {}", i + 1, e))
            })?;
        }
    }
    tx.commit()
        .map_err(|e| PipelineError::LoadFailed(format!("commit failed: {e}")))?;

    Ok(rows.len())
}

/// Load the filtered artifact at `csv_path` into the `pageviews` table.
#[instrument(skip_all, fields(src = %csv_path.display()))]
pub fn load_pageviews(connector: &dyn StoreConnector, csv_path: &Path) -> Result<usize> {
    let rows = read_filtered(csv_path)?;
    debug!(rows = rows.len(), "Read filtered rows");

    let mut handle = connector.acquire()?;
    let inserted = insert_rows(&mut handle, &rows);
    let released = connector.release(handle);
    let inserted = inserted?;
    released?;

    DataMetrics::record_rows_loaded(inserted as u64);
    info!(rows = inserted, "Data loaded successfully!");
    Ok(inserted)
}
