//! Runs whole-target assessments concurrently over a list of targets and
//! cross-checks every verdict against the classifier.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::assess::{Assessment, Assessor};
use crate::classifier::Classifier;
use crate::config::app_config::TargetSpec;
use crate::engine::Prober;
use crate::engine::dispatch::{dispatch, effective_lanes};
use crate::error::{ProbeError, Result};
use crate::http_probe::report;
use crate::report::{CsvSink, FeatureRow};
use crate::resolver::ResolvedHost;
use crate::verdict::Verdict;

/// Running agreement counts between verdicts and classifier predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetTally {
    pub agreements: usize,
    pub disagreements: usize,
    /// Completed targets without a prediction.
    pub unclassified: usize,
    /// Targets whose pipeline ended in an error.
    pub failed: usize,
}

impl TargetTally {
    pub fn record(&mut self, outcome: &TargetOutcome) {
        match outcome {
            TargetOutcome::Completed {
                verdict,
                prediction: Some(predicted),
                ..
            } => {
                if *predicted == verdict.passed {
                    self.agreements += 1;
                } else {
                    self.disagreements += 1;
                }
            }
            TargetOutcome::Completed {
                prediction: None, ..
            } => self.unclassified += 1,
            TargetOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.agreements + self.disagreements + self.unclassified + self.failed
    }

    /// Share of classified targets where the prediction matched the verdict.
    pub fn agreement_rate(&self) -> Option<f64> {
        let classified = self.agreements + self.disagreements;
        (classified > 0).then(|| self.agreements as f64 / classified as f64)
    }
}

#[derive(Debug)]
pub enum TargetOutcome {
    Completed {
        target: Url,
        host: ResolvedHost,
        verdict: Verdict,
        prediction: Option<bool>,
        row: FeatureRow,
    },
    Failed {
        target: Url,
        error: ProbeError,
    },
}

impl TargetOutcome {
    pub fn target(&self) -> &Url {
        match self {
            TargetOutcome::Completed { target, .. } | TargetOutcome::Failed { target, .. } => {
                target
            }
        }
    }
}

#[derive(Debug)]
pub struct LoopReport {
    /// One outcome per target, in input order.
    pub outcomes: Vec<TargetOutcome>,
    pub tally: TargetTally,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
}

/// Persists the feature row and asks the classifier for its opinion.
///
/// A failed CSV write or prediction is logged; the assessment still counts.
pub fn persist_and_classify(
    sink: &CsvSink,
    classifier: Option<&dyn Classifier>,
    assessment: &Assessment,
) -> Option<bool> {
    if let Err(e) = sink.append(&assessment.row) {
        log::error!(
            "Failed to write results for {} to {}: {}",
            assessment.target,
            sink.path().display(),
            report(&e)
        );
    }

    let classifier = classifier?;
    match classifier.predict(&assessment.row) {
        Ok(predicted) => {
            if predicted == assessment.verdict.passed {
                log::info!(
                    "[{}] classifier agrees: passed = {predicted}",
                    assessment.target
                );
            } else {
                log::warn!(
                    "[{}] classifier disagrees: predicted {predicted}, verdict {}",
                    assessment.target,
                    assessment.verdict.passed
                );
            }
            Some(predicted)
        }
        Err(e) => {
            log::error!("[{}] classification failed: {e}", assessment.target);
            None
        }
    }
}

/// Multi-target orchestrator.
pub struct Looper<P> {
    assessor: Arc<Assessor<P>>,
    sink: Arc<CsvSink>,
    classifier: Option<Arc<dyn Classifier>>,
    max_threads: usize,
}

impl<P: Prober> Looper<P> {
    pub fn new(
        assessor: Assessor<P>,
        sink: CsvSink,
        classifier: Option<Arc<dyn Classifier>>,
        max_threads: usize,
    ) -> Self {
        Self {
            assessor: Arc::new(assessor),
            sink: Arc::new(sink),
            classifier,
            max_threads,
        }
    }

    /// Assesses every target, at most `max_threads` at a time.
    ///
    /// A target that fails is recorded and the others carry on. Cancelling
    /// stops every outer lane; the call then returns `Interrupted` once all
    /// lanes have wound down.
    pub async fn run(
        &self,
        targets: Vec<TargetSpec>,
        cancel: &CancellationToken,
    ) -> Result<LoopReport> {
        let started = Local::now();
        log::info!(
            "Loop started at {} over {} targets",
            started.format("%Y-%m-%d %H:%M:%S"),
            targets.len()
        );

        let lanes = effective_lanes(targets.len(), self.max_threads);
        let plan = dispatch(targets.iter().map(|t| t.url.clone()), lanes);
        let specs = Arc::new(targets);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for queue in plan.into_lanes() {
            let assessor = Arc::clone(&self.assessor);
            let sink = Arc::clone(&self.sink);
            let classifier = self.classifier.clone();
            let specs = Arc::clone(&specs);
            let results = tx.clone();
            let cancel = cancel.clone();

            workers.spawn(async move {
                for slot in queue {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let spec = &specs[slot.id];
                    let accuracy = spec.accuracy.unwrap_or(assessor.settings().accuracy);
                    let outcome = match assessor
                        .assess_with_accuracy(&spec.url, accuracy, &cancel)
                        .await
                    {
                        Ok(assessment) => {
                            let prediction = persist_and_classify(
                                &sink,
                                classifier.as_deref(),
                                &assessment,
                            );
                            TargetOutcome::Completed {
                                target: assessment.target,
                                host: assessment.host,
                                verdict: assessment.verdict,
                                prediction,
                                row: assessment.row,
                            }
                        }
                        Err(ProbeError::Interrupted) => break,
                        Err(error) => {
                            log::error!("[{}] assessment failed: {}", spec.url, report(&error));
                            TargetOutcome::Failed {
                                target: spec.url.clone(),
                                error,
                            }
                        }
                    };
                    if results.send((slot.id, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut collected = Vec::with_capacity(specs.len());
        let mut tally = TargetTally::default();
        while let Some((id, outcome)) = rx.recv().await {
            tally.record(&outcome);
            collected.push((id, outcome));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                log::error!("Target lane task failed: {e}");
            }
        }

        if cancel.is_cancelled() {
            return Err(ProbeError::Interrupted);
        }

        collected.sort_by_key(|(id, _)| *id);
        let finished = Local::now();
        log::info!(
            "Loop finished at {} after {:.2}s",
            finished.format("%Y-%m-%d %H:%M:%S"),
            (finished - started).num_milliseconds() as f64 / 1000.0
        );

        Ok(LoopReport {
            outcomes: collected.into_iter().map(|(_, outcome)| outcome).collect(),
            tally,
            started,
            finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::assess::tests::assessor;
    use crate::classifier::ForestClassifier;
    use crate::engine::testing::ScriptedProber;

    struct AlwaysFail;

    impl Classifier for AlwaysFail {
        fn predict(&self, _row: &FeatureRow) -> Result<bool> {
            Ok(false)
        }
    }

    fn spec(url: &str, accuracy: Option<usize>) -> TargetSpec {
        TargetSpec {
            url: Url::parse(url).expect("url"),
            accuracy,
        }
    }

    fn targets() -> Vec<TargetSpec> {
        vec![
            spec("http://127.0.0.1/a", None),
            spec("http://127.0.0.2/b", Some(1)),
            spec("http://127.0.0.3/c", None),
        ]
    }

    #[tokio::test]
    async fn test_failing_target_is_isolated() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let looper = Looper::new(
            assessor(ScriptedProber::steady(0.2, 0.01), 4),
            CsvSink::new(dir.path().join("out.csv")),
            None,
            2,
        );

        let report = looper
            .run(targets(), &CancellationToken::new())
            .await
            .expect("report");

        assert_eq!(report.outcomes.len(), 3);
        assert!(matches!(report.outcomes[0], TargetOutcome::Completed { .. }));
        assert!(matches!(
            report.outcomes[1],
            TargetOutcome::Failed {
                error: ProbeError::InsufficientSamples { .. },
                ..
            }
        ));
        assert!(matches!(report.outcomes[2], TargetOutcome::Completed { .. }));
        assert_eq!(report.outcomes[2].target().as_str(), "http://127.0.0.3/c");
        assert_eq!(
            report.tally,
            TargetTally {
                agreements: 0,
                disagreements: 0,
                unclassified: 2,
                failed: 1,
            }
        );
        assert!(report.finished >= report.started);

        let rows = std::fs::read_to_string(dir.path().join("out.csv")).expect("csv");
        // header plus one row per completed target
        assert_eq!(rows.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_tally_compares_predictions() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let agreeing: Arc<dyn Classifier> =
            Arc::new(ForestClassifier::from_yaml("trees:\n  - leaf: true\n").expect("model"));
        let looper = Looper::new(
            assessor(ScriptedProber::steady(0.2, 0.01), 4),
            CsvSink::new(dir.path().join("out.csv")),
            Some(agreeing),
            3,
        );
        let report = looper
            .run(targets(), &CancellationToken::new())
            .await
            .expect("report");
        assert_eq!(report.tally.agreements, 2);
        assert_eq!(report.tally.failed, 1);
        assert_eq!(report.tally.agreement_rate(), Some(1.0));

        let looper = Looper::new(
            assessor(ScriptedProber::steady(0.2, 0.01), 4),
            CsvSink::new(dir.path().join("out.csv")),
            Some(Arc::new(AlwaysFail)),
            3,
        );
        let report = looper
            .run(targets(), &CancellationToken::new())
            .await
            .expect("report");
        assert_eq!(report.tally.disagreements, 2);
        assert_eq!(report.tally.total(), 3);
        assert_eq!(report.tally.agreement_rate(), Some(0.0));
    }

    #[tokio::test]
    async fn test_unwritable_outfile_is_not_fatal() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        // a directory where the CSV file should be
        let looper = Looper::new(
            assessor(ScriptedProber::steady(0.2, 0.01), 3),
            CsvSink::new(dir.path()),
            None,
            2,
        );
        let report = looper
            .run(vec![spec("http://127.0.0.1/a", None)], &CancellationToken::new())
            .await
            .expect("report");
        assert_eq!(report.tally.unclassified, 1);
    }

    #[tokio::test]
    async fn test_interrupt_stops_both_pool_levels() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let looper = Looper::new(
            assessor(
                ScriptedProber::steady(0.2, 0.01).with_wire_time(Duration::from_secs(30)),
                6,
            ),
            CsvSink::new(dir.path().join("out.csv")),
            None,
            2,
        );
        let prober = Arc::clone(looper.assessor.prober());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let steady = vec![
            spec("http://127.0.0.1/a", None),
            spec("http://127.0.0.2/b", None),
            spec("http://127.0.0.3/c", None),
        ];
        let started = std::time::Instant::now();
        let result = looper.run(steady, &cancel).await;

        assert!(matches!(result, Err(ProbeError::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(prober.in_flight.load(Ordering::SeqCst), 0);
        // two outer lanes, three inner lanes each, nothing after the first round
        assert_eq!(prober.get_calls.load(Ordering::SeqCst), 6);
        assert!(!dir.path().join("out.csv").exists());
    }

    #[test]
    fn test_tally_without_classified_targets() {
        let tally = TargetTally {
            unclassified: 4,
            ..Default::default()
        };
        assert_eq!(tally.agreement_rate(), None);
        assert_eq!(tally.total(), 4);
    }
}
