use std::collections::TryReserveError;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the sampling core and the emitter.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The counter source could not be opened or read. Skip this sample.
    #[error("counter source {} unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to allocate usage buffer for {cores} cores")]
    AllocationFailure {
        cores: usize,
        #[source]
        source: TryReserveError,
    },

    /// The emitter could not acquire its socket or worker thread.
    #[error("failed to set up transport to {destination}: {source}")]
    TransportSetup {
        destination: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("emitter is already running (sending to {0})")]
    EmitterRunning(SocketAddr),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("sampling hub has stopped")]
    HubStopped,

    #[error("malformed datagram: {0}")]
    MalformedDatagram(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
