//! Append-only log plus the read-only snapshots handed to presentation layers.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::session::MonitorState;
use crate::availability::JourneyInfo;

/// Unbounded, ordered log lines for one session.
#[derive(Debug, Default, Clone)]
pub struct LogSink {
    lines: Vec<String>,
}

impl LogSink {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn extend<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lines.extend(lines);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Everything a presentation layer may read about the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub target: Option<String>,
    pub state: MonitorState,
    pub check_count: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub journey_info: Option<JourneyInfo>,
    pub last_alert: Option<JourneyInfo>,
    pub logs: Vec<String>,
}

impl SessionSnapshot {
    /// Whole seconds left before the armed check, floored at zero.
    pub fn seconds_until_next_check(&self, now: DateTime<Utc>) -> i64 {
        self.next_check_at
            .map(|next| (next - now).num_seconds().max(0))
            .unwrap_or(0)
    }
}

/// Renders a countdown as `m:ss`.
pub fn format_countdown(seconds: i64) -> String {
    if seconds <= 0 {
        return "0:00".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Publishes snapshots through a `watch` channel; readers always see the latest one.
#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<SessionSnapshot>,
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    pub fn publish(&self, snapshot: SessionSnapshot) {
        debug!(
            state = ?snapshot.state,
            check_count = snapshot.check_count,
            log_lines = snapshot.logs.len(),
            "Publishing session snapshot."
        );
        // send_replace keeps the value even while nobody is subscribed
        self.tx.send_replace(snapshot);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }
}
