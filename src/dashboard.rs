//! Dashboard rendering for the aggregation result
//!
//! Turns the ranked `(company, max_pageviews)` pairs into a headline, a
//! terminal bar chart, and a JSON chart document.

use crate::error::Result;
use crate::types::CompanyPageviews;
use serde::Serialize;

/// Upper-case the first character and lower-case the rest ("gOOGLE" -> "Google").
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub company: String,
    pub pageviews: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    /// Build a chart keeping the ranking's order; names are capitalized for display.
    pub fn from_ranking(title: impl Into<String>, ranking: &[CompanyPageviews]) -> Self {
        Self {
            title: title.into(),
            bars: ranking
                .iter()
                .map(|c| Bar {
                    company: capitalize(&c.company),
                    pageviews: c.max_pageviews,
                })
                .collect(),
        }
    }

    pub fn headline(&self) -> Option<String> {
        let top = self.bars.first()?;
        Some(format!(
            "The company with the highest pageviews is: {} with {} pageviews.",
            top.company, top.pageviews
        ))
    }

    /// Horizontal bars scaled so the largest value spans `width` cells.
    pub fn render_text(&self, width: usize) -> String {
        let label_width = self
            .bars
            .iter()
            .map(|b| b.company.chars().count())
            .max()
            .unwrap_or(0);
        let max = self.bars.iter().map(|b| b.pageviews).max().unwrap_or(0);

        let mut out = format!("{}\n", self.title);
        for bar in &self.bars {
            let cells = if max > 0 && bar.pageviews > 0 {
                let scaled = (bar.pageviews as f64 / max as f64 * width as f64).round() as usize;
                scaled.max(1)
            } else {
                0
            };
            out.push_str(&format!(
                "{:<label_width$} │{} {}\n",
                bar.company,
                "█".repeat(cells),
                bar.pageviews,
            ));
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("google"), "Google");
        assert_eq!(capitalize("gOOGLE"), "Google");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("émile"), "Émile");
    }

    #[test]
    fn test_chart_keeps_ranking_order() {
        let chart = BarChart::from_ranking(
            "Pageviews Analysis",
            &[
                CompanyPageviews::new("google", 900),
                CompanyPageviews::new("facebook", 700),
            ],
        );
        let names: Vec<&str> = chart.bars.iter().map(|b| b.company.as_str()).collect();
        assert_eq!(names, vec!["Google", "Facebook"]);
        assert_eq!(
            chart.headline().unwrap(),
            "The company with the highest pageviews is: Google with 900 pageviews."
        );
    }

    #[test]
    fn test_render_text_scales_bars() {
        let chart = BarChart::from_ranking(
            "Pageviews",
            &[
                CompanyPageviews::new("google", 100),
                CompanyPageviews::new("apple", 50),
                CompanyPageviews::new("amazon", 0),
            ],
        );
        let text = chart.render_text(10);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Pageviews");
        assert_eq!(lines[1], format!("Google │{} 100", "█".repeat(10)));
        assert_eq!(lines[2], format!("Apple  │{} 50", "█".repeat(5)));
        assert_eq!(lines[3], "Amazon │ 0");
    }

    #[test]
    fn test_empty_chart() {
        let chart = BarChart::from_ranking("Pageviews", &[]);
        assert!(chart.headline().is_none());
        assert_eq!(chart.render_text(20), "Pageviews\n");
        let json: serde_json::Value = serde_json::from_str(&chart.to_json().unwrap()).unwrap();
        assert_eq!(json["bars"].as_array().unwrap().len(), 0);
    }
}
