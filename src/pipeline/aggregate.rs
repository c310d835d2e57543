use crate::app::ports::StoreConnector;
use crate::error::Result;
use crate::types::CompanyPageviews;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection};
use tracing::{debug, info, instrument, warn};

// Ties on the maximum fall back to company name so repeated runs agree.
const TOP_COMPANIES_SQL: &str = "
    SELECT company, MAX(pageviews) AS max_pageviews
    FROM pageviews
    GROUP BY company
    ORDER BY max_pageviews DESC, company ASC
    LIMIT ?1
";

const TABLE_EXISTS_SQL: &str =
    "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'pageviews')";

static DUMP_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"pageviews-(\d{8})-(\d{6})").expect("dump name regex should be valid")
});

/// The hour a pageviews dump covers, recovered from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHour(NaiveDateTime);

impl DumpHour {
    /// Parse `pageviews-YYYYMMDD-HHMMSS` out of a dump URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let caps = DUMP_NAME.captures(url)?;
        let stamp = format!("{}{}", &caps[1], &caps[2]);
        NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S")
            .ok()
            .map(DumpHour)
    }

    /// e.g. "October 10, 2024 at 4pm"
    pub fn describe(&self) -> String {
        self.0.format("%B %-d, %Y at %-I%P").to_string()
    }
}

/// Query the top `top_n` companies by their highest single pageview count.
///
/// Read-only: a database that was never loaded yields an empty ranking.
pub fn query_top_companies(conn: &Connection, top_n: usize) -> Result<Vec<CompanyPageviews>> {
    let has_table: bool = conn.query_row(TABLE_EXISTS_SQL, [], |row| row.get(0))?;
    if !has_table {
        debug!("No pageviews table yet");
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(TOP_COMPANIES_SQL)?;
    let rows = stmt.query_map(params![top_n as i64], |row| {
        Ok(CompanyPageviews {
            company: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            max_pageviews: row.get(1)?,
        })
    })?;

    let mut ranking = Vec::new();
    for row in rows {
        ranking.push(row?);
    }
    Ok(ranking)
}

/// Run the aggregation through `connector` and log the headline sentence.
///
/// Covers every row ever loaded; the table carries no batch column.
#[instrument(skip(connector, dump_hour))]
pub fn top_companies(
    connector: &dyn StoreConnector,
    top_n: usize,
    dump_hour: Option<&DumpHour>,
) -> Result<Vec<CompanyPageviews>> {
    let handle = connector.acquire()?;
    let ranking = query_top_companies(&handle, top_n);
    let released = connector.release(handle);
    let ranking = ranking?;
    released?;

    match headline(&ranking, dump_hour) {
        Some(sentence) => info!("{}", sentence),
        None => warn!("No pageviews rows to analyze"),
    }
    Ok(ranking)
}

/// The human-readable sentence naming the top company, or `None` for an empty ranking.
pub fn headline(ranking: &[CompanyPageviews], dump_hour: Option<&DumpHour>) -> Option<String> {
    let top = ranking.first()?;
    let lead = match dump_hour {
        Some(hour) => format!(
            "On {}, the company with highest pageviews",
            hour.describe()
        ),
        None => "The company with highest pageviews".to_string(),
    };
    Some(format!(
        "{}: {} with {} page views",
        lead, top.company, top.max_pageviews
    ))
}
