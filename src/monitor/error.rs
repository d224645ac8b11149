use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Invalid wait range {min_wait_secs}s..{max_wait_secs}s: min must not exceed max, max must not exceed a day")]
    InvalidBackoff { min_wait_secs: u64, max_wait_secs: u64 },
    #[error("Monitor scheduler is no longer running")]
    SchedulerClosed,
}
