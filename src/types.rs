use serde::{Deserialize, Serialize};

/// One whitespace-delimited line of a pageview dump.
///
/// Only the first three fields are kept; anything after the view count is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewRecord<'a> {
    pub domain_code: &'a str,
    pub page_title: &'a str,
    pub view_count: &'a str,
}

/// A dump line that matched the watch-list, as written to the filtered CSV.
///
/// `pageviews` stays a string: the filter copies the dump field verbatim and
/// only the loader coerces it to an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredRow {
    pub company: String,
    pub pageviews: String,
}

impl FilteredRow {
    pub fn new(company: impl Into<String>, pageviews: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            pageviews: pageviews.into(),
        }
    }
}

/// One entry of the aggregation result: a company and its highest observed count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPageviews {
    pub company: String,
    pub max_pageviews: i64,
}

impl CompanyPageviews {
    pub fn new(company: impl Into<String>, max_pageviews: i64) -> Self {
        Self {
            company: company.into(),
            max_pageviews,
        }
    }
}
