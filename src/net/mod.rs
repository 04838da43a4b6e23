pub mod emitter;
pub mod listener;
pub mod wire;

pub use emitter::{Emitter, Feed, EMIT_PERIOD};
pub use listener::Listener;
pub use wire::{decode, encode, WireSample};
