//! Stage and data-volume metrics
//!
//! `StageMetrics` tracks each pipeline stage's outcome and duration, labelled
//! with the stage name. `DataMetrics` tracks how much data flowed through.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for stage outcomes
pub struct StageMetrics;

impl StageMetrics {
    pub fn record_success(stage: &'static str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "stage", "completed"), "stage" => stage)
            .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "stage", "duration_seconds"), "stage" => stage)
            .record(duration_secs);
    }

    pub fn record_failure(stage: &'static str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "stage", "failed"), "stage" => stage)
            .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "stage", "duration_seconds"), "stage" => stage)
            .record(duration_secs);
    }

    pub fn record_retry(stage: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "stage", "retries"), "stage" => stage)
            .increment(1);
    }
}

impl PhaseMetrics for StageMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "stage", "completed"));
        let _ = counter!(phase_metric!(counter, "stage", "failed"));
        let _ = counter!(phase_metric!(counter, "stage", "retries"));
        let _ = histogram!(phase_metric!(histogram, "stage", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "stage"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "stage", "completed"),
                metric_type: MetricType::Counter,
                help: "Number of pipeline stages that completed successfully",
                labels: vec!["stage"],
            },
            MetricDoc {
                name: phase_metric!(counter, "stage", "failed"),
                metric_type: MetricType::Counter,
                help: "Number of pipeline stage attempts that failed",
                labels: vec!["stage"],
            },
            MetricDoc {
                name: phase_metric!(counter, "stage", "retries"),
                metric_type: MetricType::Counter,
                help: "Number of stage retries scheduled by the run policy",
                labels: vec!["stage"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "stage", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Duration of a single stage attempt in seconds",
                labels: vec!["stage"],
            },
        ]
    }
}

/// Metrics collection for data volume
pub struct DataMetrics;

impl DataMetrics {
    pub fn record_dump_bytes(bytes: usize) {
        ::metrics::histogram!(phase_metric!(histogram, "data", "dump_bytes")).record(bytes as f64);
    }

    pub fn record_filter_pass(lines_scanned: u64, rows_matched: u64) {
        ::metrics::counter!(phase_metric!(counter, "data", "lines_scanned")).increment(lines_scanned);
        ::metrics::counter!(phase_metric!(counter, "data", "rows_filtered")).increment(rows_matched);
    }

    pub fn record_rows_loaded(rows: u64) {
        ::metrics::counter!(phase_metric!(counter, "data", "rows_loaded")).increment(rows);
    }
}

impl PhaseMetrics for DataMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = histogram!(phase_metric!(histogram, "data", "dump_bytes"));
        let _ = counter!(phase_metric!(counter, "data", "lines_scanned"));
        let _ = counter!(phase_metric!(counter, "data", "rows_filtered"));
        let _ = counter!(phase_metric!(counter, "data", "rows_loaded"));
    }

    fn phase_name() -> &'static str {
        "data"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(histogram, "data", "dump_bytes"),
                metric_type: MetricType::Histogram,
                help: "Size of the downloaded compressed dump in bytes",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "data", "lines_scanned"),
                metric_type: MetricType::Counter,
                help: "Dump lines read by the filter stage",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "data", "rows_filtered"),
                metric_type: MetricType::Counter,
                help: "Dump lines that matched the watch-list",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "data", "rows_loaded"),
                metric_type: MetricType::Counter,
                help: "Rows inserted into the pageviews table",
                labels: vec![],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_metrics_registration() {
        StageMetrics::register_metrics();
        DataMetrics::register_metrics();
        // Recording without an installed recorder is a no-op
        StageMetrics::record_success("fetch", 0.5);
        DataMetrics::record_filter_pass(10, 2);
    }

    #[test]
    fn test_metrics_documentation() {
        let docs = StageMetrics::metrics_documentation();
        assert_eq!(docs.len(), 4);
        for doc in docs {
            assert!(doc.name.starts_with("pageviews_stage_"));
            assert_eq!(doc.labels, vec!["stage"]);
        }

        let docs = DataMetrics::metrics_documentation();
        assert_eq!(docs.len(), 4);
        assert!(docs
            .iter()
            .all(|d| d.name.starts_with("pageviews_data_")));
    }

    #[test]
    fn test_counter_names_end_with_total() {
        for doc in StageMetrics::metrics_documentation()
            .into_iter()
            .chain(DataMetrics::metrics_documentation())
        {
            if doc.metric_type == MetricType::Counter {
                assert!(doc.name.ends_with("_total"), "{}", doc.name);
            }
        }
    }
}
