use crate::error::{MonitorError, Result};
use crate::monitor::sampler::Sampler;
use crate::monitor::usage::UsageResult;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pending results a subscriber may fall behind by before ticks are dropped.
const SUBSCRIBER_BACKLOG: usize = 16;

type Subscribers = Arc<Mutex<Vec<Sender<UsageResult>>>>;

/// One sampling loop owning the sampler and its cadence, fanning each
/// result out to every subscriber.
pub struct SampleHub {
    subscribers: Subscribers,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SampleHub {
    pub fn start(sampler: Sampler, interval: Duration) -> Result<Self> {
        sampler.initialize()?;

        let subscribers: Subscribers = Arc::default();
        let (stop_tx, stop_rx) = channel::bounded(1);
        let fan_out = Arc::clone(&subscribers);

        let thread = thread::Builder::new()
            .name("cpu-pulse-hub".into())
            .spawn(move || run(sampler, interval, fan_out, stop_rx))
            .map_err(|source| MonitorError::Spawn {
                name: "sampling hub",
                source,
            })?;

        info!(interval_ms = interval.as_millis() as u64, "sampling hub started");
        Ok(Self {
            subscribers,
            stop_tx,
            thread: Some(thread),
        })
    }

    pub fn subscribe(&self) -> Receiver<UsageResult> {
        let (tx, rx) = channel::bounded(SUBSCRIBER_BACKLOG);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop sampling and wait for the loop to exit. Subscribers see their
    /// channel disconnect afterwards.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.stop_tx.try_send(());
            if thread.join().is_err() {
                warn!("sampling hub thread panicked");
            }
            info!("sampling hub stopped");
        }
    }
}

impl Drop for SampleHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(sampler: Sampler, interval: Duration, subscribers: Subscribers, stop_rx: Receiver<()>) {
    loop {
        match sampler.sample() {
            Ok(result) => broadcast(&subscribers, result),
            Err(err) => warn!(error = %err, "skipping sample"),
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }

    sampler.teardown();
    subscribers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

fn broadcast(subscribers: &Subscribers, result: UsageResult) {
    let mut subscribers = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
    subscribers.retain(|tx| match tx.try_send(result.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("subscriber lagging, dropping tick");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    });
}
