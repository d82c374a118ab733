//! Crash recovery through an append-only command log

mod log;
mod replay;

pub use log::{CommandLog, SyncPolicy};
pub use replay::{ReplayStats, replay};
