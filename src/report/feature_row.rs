use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::probe_config::ThresholdConfig;
use crate::engine::batch::StatusHistogram;
use crate::http_probe::result::StatusClass;
use crate::stats::BatchStatistics;
use crate::verdict::Verdict;

/// Columns a classifier may look at. Everything but the two verdict columns.
pub const FEATURE_NAMES: [&str; 20] = [
    "GET Sent",
    "Ping Sent",
    "Delay",
    "Threshold",
    "Ping Threshold",
    "Std Dev Threshold",
    "Ping Std Dev Threshold",
    "GET Latency Average",
    "Min GET Latency",
    "Max GET Latency",
    "Ping Latency Average",
    "Min Ping Latency",
    "Max Ping Latency",
    "Std Dev",
    "Ping Std Dev",
    "1xx",
    "2xx",
    "3xx",
    "4xx",
    "5xx",
];

/// One assessment, flattened. Field order is the CSV column order and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(rename = "GET Sent")]
    pub get_sent: usize,
    #[serde(rename = "Ping Sent")]
    pub ping_sent: usize,
    #[serde(rename = "Delay")]
    pub delay: f64,
    #[serde(rename = "Threshold")]
    pub threshold: f64,
    #[serde(rename = "Ping Threshold")]
    pub ping_threshold: f64,
    #[serde(rename = "Std Dev Threshold")]
    pub std_dev_threshold: f64,
    #[serde(rename = "Ping Std Dev Threshold")]
    pub ping_std_dev_threshold: f64,
    #[serde(rename = "GET Latency Average")]
    pub get_latency_average: f64,
    #[serde(rename = "Min GET Latency")]
    pub min_get_latency: f64,
    #[serde(rename = "Max GET Latency")]
    pub max_get_latency: f64,
    #[serde(rename = "Ping Latency Average")]
    pub ping_latency_average: f64,
    #[serde(rename = "Min Ping Latency")]
    pub min_ping_latency: f64,
    #[serde(rename = "Max Ping Latency")]
    pub max_ping_latency: f64,
    #[serde(rename = "Std Dev")]
    pub std_dev: f64,
    #[serde(rename = "Ping Std Dev")]
    pub ping_std_dev: f64,
    #[serde(rename = "1xx")]
    pub informational: usize,
    #[serde(rename = "2xx")]
    pub success: usize,
    #[serde(rename = "3xx")]
    pub redirection: usize,
    #[serde(rename = "4xx")]
    pub client_error: usize,
    #[serde(rename = "5xx")]
    pub server_error: usize,
    #[serde(rename = "Test Final Evaluation")]
    pub final_evaluation: f64,
    /// 1 when every criterion held, 0 otherwise.
    #[serde(rename = "Test Passed")]
    pub passed: u8,
}

impl FeatureRow {
    pub fn assemble(
        accuracy: usize,
        delay: Duration,
        thresholds: &ThresholdConfig,
        statistics: &BatchStatistics,
        histogram: &StatusHistogram,
        verdict: &Verdict,
    ) -> Self {
        let get = &statistics.get;
        let icmp = &statistics.icmp;
        FeatureRow {
            get_sent: accuracy,
            ping_sent: accuracy,
            delay: delay.as_secs_f64(),
            threshold: thresholds.response_delta,
            ping_threshold: thresholds.ping_delta,
            std_dev_threshold: thresholds.stdev_ceiling,
            ping_std_dev_threshold: thresholds.ping_stdev_ceiling,
            get_latency_average: get.mean,
            min_get_latency: get.min,
            max_get_latency: get.max,
            ping_latency_average: icmp.mean,
            min_ping_latency: icmp.min,
            max_ping_latency: icmp.max,
            std_dev: get.stdev,
            ping_std_dev: icmp.stdev,
            informational: histogram.count(StatusClass::Informational),
            success: histogram.count(StatusClass::Success),
            redirection: histogram.count(StatusClass::Redirection),
            client_error: histogram.count(StatusClass::ClientError),
            server_error: histogram.count(StatusClass::ServerError),
            final_evaluation: verdict.score,
            passed: u8::from(verdict.passed),
        }
    }

    /// Look up a feature column by its CSV title.
    pub fn feature(&self, name: &str) -> Option<f64> {
        let value = match name {
            "GET Sent" => self.get_sent as f64,
            "Ping Sent" => self.ping_sent as f64,
            "Delay" => self.delay,
            "Threshold" => self.threshold,
            "Ping Threshold" => self.ping_threshold,
            "Std Dev Threshold" => self.std_dev_threshold,
            "Ping Std Dev Threshold" => self.ping_std_dev_threshold,
            "GET Latency Average" => self.get_latency_average,
            "Min GET Latency" => self.min_get_latency,
            "Max GET Latency" => self.max_get_latency,
            "Ping Latency Average" => self.ping_latency_average,
            "Min Ping Latency" => self.min_ping_latency,
            "Max Ping Latency" => self.max_ping_latency,
            "Std Dev" => self.std_dev,
            "Ping Std Dev" => self.ping_std_dev,
            other => {
                let class = StatusClass::ALL.into_iter().find(|c| c.label() == other)?;
                self.status_count(class) as f64
            }
        };
        Some(value)
    }

    pub fn status_count(&self, class: StatusClass) -> usize {
        match class {
            StatusClass::Informational => self.informational,
            StatusClass::Success => self.success,
            StatusClass::Redirection => self.redirection,
            StatusClass::ClientError => self.client_error,
            StatusClass::ServerError => self.server_error,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed == 1
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stats::LatencyStatistics;

    pub(crate) fn sample_row() -> FeatureRow {
        let statistics = BatchStatistics {
            get: LatencyStatistics {
                mean: 0.3,
                stdev: 0.02,
                min: 0.27,
                max: 0.33,
            },
            icmp: LatencyStatistics {
                mean: 0.015,
                stdev: 0.001,
                min: 0.014,
                max: 0.016,
            },
        };
        let mut histogram = StatusHistogram::default();
        for _ in 0..9 {
            histogram.record(StatusClass::Success);
        }
        histogram.record(StatusClass::ClientError);
        let verdict = Verdict::from_criteria([true, true, false, true, true, true]);
        FeatureRow::assemble(
            10,
            Duration::from_millis(250),
            &ThresholdConfig::default(),
            &statistics,
            &histogram,
            &verdict,
        )
    }

    #[test]
    fn test_assemble_copies_every_metric() {
        let row = sample_row();
        assert_eq!(row.get_sent, 10);
        assert_eq!(row.ping_sent, 10);
        assert_eq!(row.delay, 0.25);
        assert_eq!(row.get_latency_average, 0.3);
        assert_eq!(row.max_ping_latency, 0.016);
        assert_eq!(row.success, 9);
        assert_eq!(row.client_error, 1);
        assert_eq!(row.informational, 0);
        assert_eq!(row.passed, 0);
        assert!(!row.passed());
        assert!((row.final_evaluation - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_every_feature_name_resolves() {
        let row = sample_row();
        for name in FEATURE_NAMES {
            assert!(row.feature(name).is_some(), "missing feature {name}");
        }
        assert_eq!(row.feature("Test Passed"), None);
        assert_eq!(row.feature("Test Final Evaluation"), None);
        assert_eq!(row.feature("4xx"), Some(1.0));
    }

    #[test]
    fn test_header_order_is_stable() {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(sample_row()).expect("serialize");
        let data = String::from_utf8(writer.into_inner().expect("flush")).expect("utf8");
        let header = data.lines().next().expect("header");

        let mut expected: Vec<&str> = FEATURE_NAMES.to_vec();
        expected.extend(["Test Final Evaluation", "Test Passed"]);
        assert_eq!(header, expected.join(","));
    }
}
