use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::Prober;
use super::batch::ProbeBatch;
use super::dispatch::{DispatchPlan, ProbeSlot};
use crate::error::{ProbeError, Result};
use crate::http_probe::result::{ProbeResult, Protocol};
use crate::resolver::ResolvedHost;

/// Spaces slot submissions at least `delay` apart across every lane of a run.
struct Pacer {
    delay: Duration,
    next: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            next: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut next = self.next.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.delay);
    }
}

struct Lane<P> {
    id: usize,
    queue: VecDeque<ProbeSlot>,
    prober: Arc<P>,
    host: Arc<ResolvedHost>,
    pacer: Arc<Pacer>,
    results: mpsc::UnboundedSender<ProbeResult>,
    cancel: CancellationToken,
}

impl<P: Prober> Lane<P> {
    /// Drains the lane's queue in order, one slot in flight at a time.
    async fn run(self) {
        for slot in self.queue {
            if self.cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.pacer.wait() => {}
            }

            log::debug!("Lane {} submitting slot {}", self.id, slot.id);
            let probes = async {
                tokio::join!(self.prober.get(&slot.target), self.prober.echo(&self.host))
            };
            let (get, echo) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                pair = probes => pair,
            };

            let sent = self
                .results
                .send(ProbeResult::from_sample(slot.id, Protocol::Get, get))
                .and_then(|_| {
                    self.results
                        .send(ProbeResult::from_sample(slot.id, Protocol::Icmp, echo))
                });
            if sent.is_err() {
                log::warn!("Lane {}: result collector is gone, stopping", self.id);
                break;
            }
        }
    }
}

/// Runs every slot of `plan` against `host` and collects the results.
///
/// Each lane of the plan becomes one task, so at most `plan.lane_count()` slots
/// are in flight. Results are funnelled through a channel into a single
/// collector that owns the batch. All lane tasks are awaited before returning,
/// also when `cancel` fires, in which case the run reports `Interrupted`.
pub async fn run_batch<P: Prober>(
    prober: Arc<P>,
    host: ResolvedHost,
    plan: DispatchPlan,
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeBatch> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pacer = Arc::new(Pacer::new(delay));
    let host = Arc::new(host);

    let mut lanes = JoinSet::new();
    for (id, queue) in plan.into_lanes().into_iter().enumerate() {
        let lane = Lane {
            id,
            queue,
            prober: Arc::clone(&prober),
            host: Arc::clone(&host),
            pacer: Arc::clone(&pacer),
            results: tx.clone(),
            cancel: cancel.clone(),
        };
        lanes.spawn(lane.run());
    }
    drop(tx);

    let mut batch = ProbeBatch::new();
    while let Some(result) = rx.recv().await {
        batch.record(result);
    }

    while let Some(joined) = lanes.join_next().await {
        if let Err(e) = joined {
            log::error!("Probe lane task failed: {e}");
        }
    }

    if cancel.is_cancelled() {
        return Err(ProbeError::Interrupted);
    }
    Ok(batch)
}
