pub mod counters;
pub mod cpu;
pub mod hub;
pub mod sampler;
pub mod usage;

pub use counters::{read_counters, CounterSnapshot, SnapshotSet};
pub use cpu::CpuMonitor;
pub use hub::SampleHub;
pub use sampler::Sampler;
pub use usage::{usage_percent, UsageResult};
