use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::probe_config::ProbeSettings;
use crate::engine::Prober;
use crate::engine::batch::ProbeBatch;
use crate::engine::dispatch::probe_plan;
use crate::engine::pool::run_batch;
use crate::error::{ProbeError, Result};
use crate::report::FeatureRow;
use crate::resolver::{ResolvedHost, TargetResolver};
use crate::stats::BatchStatistics;
use crate::verdict::{EvaluationState, Verdict};

/// Everything one target assessment produced.
#[derive(Debug)]
pub struct Assessment {
    pub target: Url,
    pub host: ResolvedHost,
    pub batch: ProbeBatch,
    pub statistics: BatchStatistics,
    pub verdict: Verdict,
    pub row: FeatureRow,
}

/// Runs the per-target pipeline: resolve, dispatch, probe, aggregate, evaluate.
pub struct Assessor<P> {
    prober: Arc<P>,
    resolver: TargetResolver,
    settings: ProbeSettings,
}

impl<P: Prober> Assessor<P> {
    pub fn new(prober: Arc<P>, resolver: TargetResolver, settings: ProbeSettings) -> Self {
        Self {
            prober,
            resolver,
            settings,
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    pub fn prober(&self) -> &Arc<P> {
        &self.prober
    }

    pub async fn assess(&self, target: &Url, cancel: &CancellationToken) -> Result<Assessment> {
        self.assess_with_accuracy(target, self.settings.accuracy, cancel)
            .await
    }

    /// Same as [`Assessor::assess`] with a different number of probe pairs.
    pub async fn assess_with_accuracy(
        &self,
        target: &Url,
        accuracy: usize,
        cancel: &CancellationToken,
    ) -> Result<Assessment> {
        let host = tokio::select! {
            _ = cancel.cancelled() => return Err(ProbeError::Interrupted),
            host = self.resolver.resolve(target) => host,
        };
        log::info!("Probing {target} ({host}) with {accuracy} GET + ICMP pairs");

        let plan = probe_plan(target, accuracy, self.settings.max_lanes);
        log::debug!("Lane sizes for {target}: {:?}", plan.lane_sizes());
        let batch = run_batch(
            Arc::clone(&self.prober),
            host.clone(),
            plan,
            self.settings.delay,
            cancel,
        )
        .await?;
        log::info!("Status codes for {target}: {}", batch.histogram());

        let (statistics, verdict) = EvaluationState::Pending
            .advance(&batch, &self.settings.thresholds)
            .into_result()?;
        log::info!("Verdict for {target}: {verdict}");

        let row = FeatureRow::assemble(
            accuracy,
            self.settings.delay,
            &self.settings.thresholds,
            &statistics,
            batch.histogram(),
            &verdict,
        );
        Ok(Assessment {
            target: target.clone(),
            host,
            batch,
            statistics,
            verdict,
            row,
        })
    }
}
