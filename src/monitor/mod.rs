//! Monitoring core: session state, the scheduler loop and its helpers.
pub mod backoff;
pub mod dedup;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod telemetry;

pub use backoff::{BackoffGenerator, MAX_WAIT_SECS};
pub use dedup::AlertDeduplicator;
pub use error::MonitorError;
pub use scheduler::{MonitorHandle, MonitorScheduler, STOPPED_BY_USER, Transition};
pub use session::{MonitorSession, MonitorState};
pub use telemetry::{LogSink, SessionSnapshot, SnapshotPublisher, format_countdown};
