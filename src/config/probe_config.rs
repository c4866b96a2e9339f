use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProbeError, Result};

pub const DEFAULT_ACCURACY: usize = 10;
pub const DEFAULT_THRESHOLD: f64 = 0.1;
pub const DEFAULT_MAX_LANES: usize = 10;
pub const DEFAULT_PING_TIMEOUT_SECONDS: u64 = 4;

/// The four tolerance values the verdict is judged against, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Half-width of the band around the GET latency mean.
    pub response_delta: f64,
    /// Half-width of the band around the ICMP latency mean.
    pub ping_delta: f64,
    /// GET standard deviation must stay strictly below this.
    pub stdev_ceiling: f64,
    /// ICMP standard deviation must stay strictly below this.
    pub ping_stdev_ceiling: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            response_delta: DEFAULT_THRESHOLD,
            ping_delta: DEFAULT_THRESHOLD,
            stdev_ceiling: DEFAULT_THRESHOLD,
            ping_stdev_ceiling: DEFAULT_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("threshold", self.response_delta),
            ("ping-threshold", self.ping_delta),
            ("std-deviation-threshold", self.stdev_ceiling),
            ("ping-std-deviation-threshold", self.ping_stdev_ceiling),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ProbeError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Everything one target assessment needs besides the target itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Number of paired GET + ICMP probes per target.
    pub accuracy: usize,
    /// Upper bound on concurrently running probe lanes.
    pub max_lanes: usize,
    /// Minimum spacing between successive slot submissions.
    pub delay: Duration,
    pub thresholds: ThresholdConfig,
    pub ping_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            max_lanes: DEFAULT_MAX_LANES,
            delay: Duration::ZERO,
            thresholds: ThresholdConfig::default(),
            ping_timeout: Duration::from_secs(DEFAULT_PING_TIMEOUT_SECONDS),
            request_timeout: None,
        }
    }
}

impl ProbeSettings {
    pub fn validate(&self) -> Result<()> {
        if self.accuracy == 0 {
            return Err(ProbeError::InvalidConfig(
                "accuracy must be at least 1".to_string(),
            ));
        }
        if self.max_lanes == 0 {
            return Err(ProbeError::InvalidConfig(
                "max-lanes must be at least 1".to_string(),
            ));
        }
        self.thresholds.validate()
    }
}

/// A single target listed in a targets file.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub url: String,

    /// Overrides the global accuracy for this target only.
    #[serde(default)]
    pub accuracy: Option<usize>,
}

/// A YAML file listing the targets for loop mode, with optional threshold overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetsFile {
    pub targets: Vec<TargetConfig>,

    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,
}
