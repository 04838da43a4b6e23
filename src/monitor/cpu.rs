use crate::error::Result;
use crate::monitor::{Sampler, UsageResult};
use crate::net::{Emitter, Feed};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// CPU monitoring: one sampler plus an optional UDP emitter sharing it.
pub struct CpuMonitor {
    sampler: Arc<Sampler>,
    emitter: Emitter,
}

impl CpuMonitor {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self::with_emit_period(source, crate::net::EMIT_PERIOD)
    }

    pub fn with_emit_period(source: impl Into<PathBuf>, period: Duration) -> Self {
        Self {
            sampler: Arc::new(Sampler::new(source)),
            emitter: Emitter::with_period(period),
        }
    }

    pub fn initialize(&self) -> Result<usize> {
        self.sampler.initialize()
    }

    /// Stops the emitter if needed, then drops the retained snapshot.
    pub fn teardown(&mut self) {
        self.emitter.stop();
        self.sampler.teardown();
    }

    pub fn sample(&self) -> Result<UsageResult> {
        self.sampler.sample()
    }

    pub fn core_count(&self) -> usize {
        self.sampler.core_count()
    }

    pub fn sampler(&self) -> Arc<Sampler> {
        Arc::clone(&self.sampler)
    }

    /// Emitter ticks share the sampler with [`CpuMonitor::sample`] callers,
    /// so each side sees only part of the elapsed interval.
    pub fn start_emitter(&mut self, destination: SocketAddr) -> Result<()> {
        self.emitter
            .start(Feed::Poll(Arc::clone(&self.sampler)), destination)
    }

    pub fn stop_emitter(&mut self) {
        self.emitter.stop();
    }

    pub fn is_emitter_running(&self) -> bool {
        self.emitter.is_running()
    }

    pub fn emitter_local_addr(&self) -> Option<SocketAddr> {
        self.emitter.local_addr()
    }
}

impl Default for CpuMonitor {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STAT_PATH)
    }
}
