use crate::error::{MonitorError, Result};
use crate::monitor::{Sampler, UsageResult};
use crate::net::wire;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam::select;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default send cadence.
pub const EMIT_PERIOD: Duration = Duration::from_secs(1);

/// Where the emitter gets its results from.
pub enum Feed {
    /// Call the sampler once per period.
    Poll(Arc<Sampler>),
    /// Forward whatever a sampling hub publishes.
    Subscription(Receiver<UsageResult>),
}

struct Worker {
    destination: SocketAddr,
    local_addr: SocketAddr,
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Periodic best-effort UDP sender. One datagram per successful sample;
/// failed samples and failed sends are skipped.
pub struct Emitter {
    period: Duration,
    running: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_period(EMIT_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Bind a socket and start the send loop. On error nothing is left
    /// running.
    pub fn start(&mut self, feed: Feed, destination: SocketAddr) -> Result<()> {
        if let Some(worker) = self.live_worker() {
            return Err(MonitorError::EmitterRunning(worker.destination));
        }
        // a loop whose feed closed has already exited; reap it
        self.stop();

        let setup = |source| MonitorError::TransportSetup {
            destination,
            source,
        };
        let bind_addr: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).map_err(setup)?;
        let local_addr = socket.local_addr().map_err(setup)?;

        let (stop_tx, stop_rx) = channel::bounded(1);
        let running = Arc::clone(&self.running);
        let period = self.period;
        running.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("cpu-pulse-emitter".into())
            .spawn(move || {
                let transport = Transport {
                    socket,
                    destination,
                };
                match feed {
                    Feed::Poll(sampler) => poll_loop(&transport, &sampler, period, &stop_rx),
                    Feed::Subscription(rx) => forward_loop(&transport, &rx, &stop_rx),
                }
                drop(transport);
                running.store(false, Ordering::SeqCst);
                info!(%destination, "emitter stopped");
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(setup(err));
            }
        };

        info!(%destination, %local_addr, "emitter started");
        self.worker = Some(Worker {
            destination,
            local_addr,
            stop_tx,
            thread,
        });
        Ok(())
    }

    /// Ask the loop to finish its current tick and wait for it. The socket
    /// is closed when this returns.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.try_send(());
        if worker.thread.join().is_err() {
            warn!("emitter thread panicked");
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn live_worker(&self) -> Option<&Worker> {
        self.worker.as_ref().filter(|_| self.is_running())
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.live_worker().map(|w| w.destination)
    }

    /// Address of the send socket while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.live_worker().map(|w| w.local_addr)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Transport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl Transport {
    fn send(&self, result: &UsageResult) {
        let payload = wire::encode(result);
        match self.socket.send_to(payload.as_bytes(), self.destination) {
            Ok(_) => debug!(payload = %payload, "datagram sent"),
            Err(err) => warn!(error = %err, destination = %self.destination, "send failed"),
        }
    }
}

fn poll_loop(transport: &Transport, sampler: &Sampler, period: Duration, stop_rx: &Receiver<()>) {
    loop {
        match sampler.sample() {
            Ok(result) => transport.send(&result),
            Err(err) => warn!(error = %err, "skipping tick"),
        }

        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

fn forward_loop(transport: &Transport, results: &Receiver<UsageResult>, stop_rx: &Receiver<()>) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(results) -> msg => match msg {
                Ok(result) => transport.send(&result),
                Err(_) => {
                    warn!(error = %MonitorError::HubStopped, "emitter feed closed");
                    break;
                }
            },
        }
    }
}
