use std::fmt;

use crate::config::probe_config::ThresholdConfig;
use crate::engine::batch::ProbeBatch;
use crate::error::ProbeError;
use crate::stats::{self, BatchStatistics};

pub const CRITERIA_COUNT: usize = 6;

/// The six checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    GetStability,
    GetMeanBand,
    StatusClasses,
    EchoReply,
    EchoStability,
    EchoMeanBand,
}

impl Criterion {
    pub const ALL: [Criterion; CRITERIA_COUNT] = [
        Criterion::GetStability,
        Criterion::GetMeanBand,
        Criterion::StatusClasses,
        Criterion::EchoReply,
        Criterion::EchoStability,
        Criterion::EchoMeanBand,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Criterion::GetStability => "GET standard deviation below ceiling",
            Criterion::GetMeanBand => "GET mean inside response band",
            Criterion::StatusClasses => "only 2xx responses",
            Criterion::EchoReply => "last ICMP echo answered",
            Criterion::EchoStability => "ICMP standard deviation below ceiling",
            Criterion::EchoMeanBand => "ICMP mean inside ping band",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub criteria: [bool; CRITERIA_COUNT],
    pub score: f64,
    pub passed: bool,
}

impl Verdict {
    pub fn from_criteria(criteria: [bool; CRITERIA_COUNT]) -> Self {
        let met = criteria.iter().filter(|c| **c).count();
        Self {
            criteria,
            score: met as f64 / CRITERIA_COUNT as f64,
            passed: met == CRITERIA_COUNT,
        }
    }

    pub fn failed_criteria(&self) -> impl Iterator<Item = Criterion> + '_ {
        Criterion::ALL
            .into_iter()
            .zip(self.criteria)
            .filter(|(_, met)| !met)
            .map(|(criterion, _)| criterion)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.passed { "passed" } else { "failed" };
        write!(f, "{outcome} ({:.4})", self.score)
    }
}

/// `center - delta < value <= center + delta`
pub fn within_half_open_band(value: f64, center: f64, delta: f64) -> bool {
    center - delta < value && value <= center + delta
}

/// `center - delta < value < center + delta`
pub fn within_open_band(value: f64, center: f64, delta: f64) -> bool {
    center - delta < value && value < center + delta
}

/// Applies the six criteria to already aggregated statistics.
///
/// The bands of criteria 2 and 6 are centred on the batch's own means, and
/// their bounds differ on purpose: the GET band includes its upper edge, the
/// ICMP band excludes both edges.
pub fn evaluate(
    statistics: &BatchStatistics,
    batch: &ProbeBatch,
    thresholds: &ThresholdConfig,
) -> Verdict {
    let get = &statistics.get;
    let icmp = &statistics.icmp;

    let criteria = [
        get.stdev < thresholds.stdev_ceiling,
        within_half_open_band(get.mean, get.mean, thresholds.response_delta),
        batch.histogram().only_success(),
        batch.last_echo_replied(),
        icmp.stdev < thresholds.ping_stdev_ceiling,
        within_open_band(icmp.mean, icmp.mean, thresholds.ping_delta),
    ];

    for (criterion, met) in Criterion::ALL.iter().zip(criteria) {
        if met {
            log::info!("[+] {}", criterion.description());
        } else {
            log::info!("[-] {}", criterion.description());
        }
    }
    Verdict::from_criteria(criteria)
}

/// Lifecycle of one batch's evaluation.
#[derive(Debug)]
pub enum EvaluationState {
    Pending,
    Evaluated {
        statistics: BatchStatistics,
        verdict: Verdict,
    },
    Error(ProbeError),
}

impl EvaluationState {
    /// `Pending` moves to `Evaluated` or `Error`; the other states are final.
    pub fn advance(self, batch: &ProbeBatch, thresholds: &ThresholdConfig) -> Self {
        match self {
            EvaluationState::Pending => match stats::aggregate(batch) {
                Ok(statistics) => {
                    let verdict = evaluate(&statistics, batch, thresholds);
                    EvaluationState::Evaluated {
                        statistics,
                        verdict,
                    }
                }
                Err(e) => EvaluationState::Error(e),
            },
            done => done,
        }
    }

    pub fn into_result(self) -> Result<(BatchStatistics, Verdict), ProbeError> {
        match self {
            EvaluationState::Evaluated {
                statistics,
                verdict,
            } => Ok((statistics, verdict)),
            EvaluationState::Error(e) => Err(e),
            EvaluationState::Pending => Err(ProbeError::NotEvaluated),
        }
    }
}
