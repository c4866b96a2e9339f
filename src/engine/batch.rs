use std::collections::BTreeMap;
use std::fmt;

use crate::http_probe::result::{ProbeOutcome, ProbeResult, Protocol, StatusClass};

/// Count of GET responses per status class. Created fresh for every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusHistogram {
    counts: BTreeMap<StatusClass, usize>,
}

impl StatusHistogram {
    pub fn record(&mut self, class: StatusClass) {
        *self.counts.entry(class).or_insert(0) += 1;
    }

    pub fn count(&self, class: StatusClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Classes that were actually observed, in class order.
    pub fn observed(&self) -> impl Iterator<Item = (StatusClass, usize)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(class, count)| (*class, *count))
    }

    /// At least one 2xx and nothing else.
    pub fn only_success(&self) -> bool {
        self.count(StatusClass::Success) > 0
            && self.observed().all(|(class, _)| class == StatusClass::Success)
    }
}

impl fmt::Display for StatusHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .observed()
            .map(|(class, count)| format!("{class}: {count}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// All results of one target run, in the order they were collected.
/// Only the worker pool's collector appends; everything downstream reads.
#[derive(Debug, Clone, Default)]
pub struct ProbeBatch {
    results: Vec<ProbeResult>,
    histogram: StatusHistogram,
}

impl ProbeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, result: ProbeResult) {
        if result.protocol == Protocol::Get {
            if let ProbeOutcome::Status(class) = result.outcome {
                self.histogram.record(class);
            }
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn histogram(&self) -> &StatusHistogram {
        &self.histogram
    }

    /// Every latency recorded for `protocol`, failures included.
    pub fn latencies(&self, protocol: Protocol) -> Vec<f64> {
        self.results
            .iter()
            .filter(|r| r.protocol == protocol)
            .map(|r| r.latency_seconds)
            .collect()
    }

    pub fn failures(&self, protocol: Protocol) -> usize {
        self.results
            .iter()
            .filter(|r| r.protocol == protocol && !r.outcome.is_success())
            .count()
    }

    /// Whether the most recently collected ICMP echo got a non-zero reply.
    pub fn last_echo_replied(&self) -> bool {
        self.results
            .iter()
            .rev()
            .find(|r| r.protocol == Protocol::Icmp)
            .is_some_and(|r| r.outcome == ProbeOutcome::Reply && r.latency_seconds > 0.0)
    }
}
