//! Sync loop runtime: timer, mirror refresh, conversion, retry and shutdown.

mod error;
pub mod logging;
mod runtime;

pub use error::{DaemonError, ErrorClass};
pub use logging::{init_tracing, LogFormat, LogTarget};
pub use runtime::{
    once_blocking, run, run_once, start_blocking, CycleReport, LoopState, SyncLoop,
};
