//! Raw sample statistics over a probe batch.
//!
//! No smoothing, outlier rejection or windowing is applied, so a verdict can
//! always be recomputed by hand from the persisted feature row.

use crate::engine::batch::ProbeBatch;
use crate::error::{ProbeError, Result};
use crate::http_probe::result::Protocol;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStatistics {
    pub mean: f64,
    /// Sample (n - 1) standard deviation.
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchStatistics {
    pub get: LatencyStatistics,
    pub icmp: LatencyStatistics,
}

/// Calculate the mean of a slice of values.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the sample standard deviation of a slice of values around `mean`.
/// Callers make sure there are at least two values.
pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn summarize(protocol: Protocol, samples: &[f64]) -> Result<LatencyStatistics> {
    if samples.len() < 2 {
        return Err(ProbeError::InsufficientSamples {
            protocol,
            found: samples.len(),
        });
    }
    let m = mean(samples);
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(LatencyStatistics {
        mean: m,
        stdev: sample_std_dev(samples, m),
        min,
        max,
    })
}

/// GET and ICMP statistics for a batch. ICMP echoes without a reply take part as 0.0.
pub fn aggregate(batch: &ProbeBatch) -> Result<BatchStatistics> {
    let get = summarize(Protocol::Get, &batch.latencies(Protocol::Get))?;
    let icmp = summarize(Protocol::Icmp, &batch.latencies(Protocol::Icmp))?;

    let lost = batch.failures(Protocol::Icmp);
    if lost > 0 {
        log::warn!("{lost} ICMP echoes got no reply and count as 0.0s, pulling the ICMP mean down");
    }
    Ok(BatchStatistics { get, icmp })
}
