//! Periodic synchronization runtime: scheduler loop, ctrl-c handling, and
//! the console + file log sink.

mod error;
pub mod log_rotation;
pub mod logging;
mod runtime;

pub use error::DaemonError;
pub use logging::{init_tracing, LogFile, LogFormat};
pub use runtime::{start_blocking, Scheduler, SchedulerSummary};
