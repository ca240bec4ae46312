//! Process-level concerns: signals, the run lock and start-up jitter.

pub mod jitter;
pub mod lock;
pub mod shutdown;
