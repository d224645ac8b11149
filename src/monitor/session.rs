use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::dedup::AlertDeduplicator;
use super::telemetry::{LogSink, SessionSnapshot};
use crate::availability::JourneyInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    #[default]
    Idle,
    Checking,
    Waiting,
    Stopped,
}

impl MonitorState {
    /// Checking or Waiting.
    pub fn is_running(self) -> bool {
        matches!(self, MonitorState::Checking | MonitorState::Waiting)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Checking => "checking",
            MonitorState::Waiting => "waiting",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// One start-to-stop run for a single target. Owned by the scheduler task only.
#[derive(Debug, Default)]
pub struct MonitorSession {
    pub session_id: Option<Uuid>,
    pub target: Option<String>,
    pub state: MonitorState,
    pub check_count: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub next_check_at: Option<DateTime<Utc>>,
    pub journey_info: Option<JourneyInfo>,
    pub last_alert: Option<JourneyInfo>,
    pub dedup: AlertDeduplicator,
    pub logs: LogSink,
}

impl MonitorSession {
    /// Wipes the previous run and enters `Checking` for `target`.
    pub fn begin(&mut self, target: String) -> Uuid {
        let session_id = Uuid::new_v4();
        *self = MonitorSession {
            session_id: Some(session_id),
            target: Some(target),
            state: MonitorState::Checking,
            ..MonitorSession::default()
        };
        session_id
    }

    pub fn is_current(&self, session_id: Uuid) -> bool {
        self.session_id == Some(session_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            target: self.target.clone(),
            state: self.state,
            check_count: self.check_count,
            last_check_at: self.last_check_at,
            next_check_at: self.next_check_at,
            journey_info: self.journey_info.clone(),
            last_alert: self.last_alert.clone(),
            logs: self.logs.lines().to_vec(),
        }
    }
}
