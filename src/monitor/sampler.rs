use crate::error::{MonitorError, Result};
use crate::monitor::counters::{read_counters, SnapshotSet};
use crate::monitor::usage::{usage_percent, UsageResult};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SamplerState {
    previous: SnapshotSet,
    core_count: usize,
}

/// Retains the previous snapshot and turns each fresh read into a
/// [`UsageResult`].
///
/// The lock covers the whole read-compute-swap, so concurrent callers are
/// each correct but consume disjoint delta windows.
#[derive(Debug)]
pub struct Sampler {
    source: PathBuf,
    state: Mutex<SamplerState>,
}

impl Sampler {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            state: Mutex::new(SamplerState::default()),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn lock(&self) -> MutexGuard<'_, SamplerState> {
        // previous is only ever replaced whole, so a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A read that yields no cpu lines counts as a failed read.
    fn read_nonempty(&self) -> Result<SnapshotSet> {
        let set = read_counters(&self.source)?;
        if set.is_empty() {
            return Err(MonitorError::SourceUnavailable {
                path: self.source.clone(),
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "no cpu counter lines"),
            });
        }
        Ok(set)
    }

    /// Take the baseline snapshot. Returns the detected core count.
    pub fn initialize(&self) -> Result<usize> {
        let mut state = self.lock();
        let baseline = self.read_nonempty()?;
        state.core_count = if baseline.has_aggregate() {
            baseline.len() - 1
        } else {
            0
        };
        state.previous = baseline;
        info!(
            cores = state.core_count,
            source = %self.source.display(),
            "sampler initialized"
        );
        Ok(state.core_count)
    }

    /// Read a fresh snapshot, compute usage against the retained one and
    /// replace it. On a failed read the retained snapshot is left untouched.
    pub fn sample(&self) -> Result<UsageResult> {
        let mut state = self.lock();
        let current = self.read_nonempty()?;

        let total_usage = match (state.previous.aggregate(), current.aggregate()) {
            (Some(prev), Some(cur)) => usage_percent(prev, cur),
            _ => 0.0,
        };

        // cores missing from either side are skipped this round
        let prev_cores = state.previous.cores();
        let cur_cores = current.cores();
        let paired = prev_cores.len().min(cur_cores.len());

        let mut per_core_usage = Vec::new();
        per_core_usage
            .try_reserve_exact(paired)
            .map_err(|source| MonitorError::AllocationFailure {
                cores: paired,
                source,
            })?;
        per_core_usage.extend(
            prev_cores
                .iter()
                .zip(cur_cores)
                .map(|(prev, cur)| usage_percent(prev, cur)),
        );

        if cur_cores.len() != prev_cores.len() {
            debug!(
                previous = prev_cores.len(),
                current = cur_cores.len(),
                "core count changed between samples"
            );
        }

        let result = UsageResult {
            total_usage,
            per_core_usage,
            core_count: current.core_count(),
        };
        state.previous = current;
        Ok(result)
    }

    /// Core count detected by [`Sampler::initialize`].
    pub fn core_count(&self) -> usize {
        self.lock().core_count
    }

    /// Release the retained snapshot.
    pub fn teardown(&self) {
        let mut state = self.lock();
        state.previous = SnapshotSet::default();
        debug!("sampler torn down");
    }
}
