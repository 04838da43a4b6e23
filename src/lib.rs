//! Per-core CPU utilization sampling from `/proc/stat`, with a UDP emitter
//! that sends one text datagram per tick.

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod net;

pub use error::{MonitorError, Result};
