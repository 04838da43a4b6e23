use crate::monitor::counters::CounterSnapshot;
use serde::Serialize;

/// Utilization computed from one pair of snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageResult {
    pub total_usage: f64,
    pub per_core_usage: Vec<f64>,
    pub core_count: usize,
}

/// Busy percentage between two reads of the same counter line.
///
/// Deltas are clamped at zero so a counter reset or an out-of-order read
/// yields 0.0 instead of a negative or oversized value.
pub fn usage_percent(prev: &CounterSnapshot, cur: &CounterSnapshot) -> f64 {
    let total_delta = cur.total().saturating_sub(prev.total());
    let idle_delta = cur.idle().saturating_sub(prev.idle());

    if total_delta == 0 {
        return 0.0;
    }

    // idle can move further than total when only some buckets reset
    let busy = total_delta.saturating_sub(idle_delta);
    busy as f64 * 100.0 / total_delta as f64
}
