use std::collections::VecDeque;

use url::Url;

/// One unit of dispatched work. For probing it stands for a paired GET + ICMP
/// round trip; the orchestrator reuses it for whole-target assessments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSlot {
    pub id: usize,
    pub target: Url,
    pub assigned_lane: usize,
}

/// Slots split into per-lane FIFO queues.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    lanes: Vec<VecDeque<ProbeSlot>>,
}

impl DispatchPlan {
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_sizes(&self) -> Vec<usize> {
        self.lanes.iter().map(VecDeque::len).collect()
    }

    pub fn slot_count(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn into_lanes(self) -> Vec<VecDeque<ProbeSlot>> {
        self.lanes
    }
}

/// Lane count for a run of `accuracy` slots: never more lanes than slots, never zero.
pub fn effective_lanes(accuracy: usize, max_lanes: usize) -> usize {
    accuracy.min(max_lanes).max(1)
}

/// Round-robin: slot `i` goes to lane `i % lanes`, in submission order.
pub fn dispatch<I>(targets: I, lanes: usize) -> DispatchPlan
where
    I: IntoIterator<Item = Url>,
{
    let lanes = lanes.max(1);
    let mut queues: Vec<VecDeque<ProbeSlot>> = (0..lanes).map(|_| VecDeque::new()).collect();
    for (id, target) in targets.into_iter().enumerate() {
        let assigned_lane = id % lanes;
        queues[assigned_lane].push_back(ProbeSlot {
            id,
            target,
            assigned_lane,
        });
    }
    DispatchPlan { lanes: queues }
}

/// Plan for probing one target `accuracy` times.
pub fn probe_plan(target: &Url, accuracy: usize, max_lanes: usize) -> DispatchPlan {
    let lanes = effective_lanes(accuracy, max_lanes);
    dispatch(std::iter::repeat_n(target.clone(), accuracy), lanes)
}
