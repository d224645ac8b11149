//! The monitor loop: one tokio task owns the session and reacts to commands,
//! the armed timer and the in-flight check, one event at a time.
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backoff::BackoffGenerator;
use super::session::{MonitorSession, MonitorState};
use super::telemetry::{SessionSnapshot, SnapshotPublisher};
use super::MonitorError;
use crate::availability::{AvailabilityClient, AvailabilityError, CheckOutcome, JourneyInfo};
use crate::notifications::Notifier;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
pub const STOPPED_BY_USER: &str = "Stopped by user";

/// Whether a request changed the session or was a no-op for its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Applied,
    Ignored,
}

enum Command {
    Start {
        target: String,
        reply: oneshot::Sender<Transition>,
    },
    Stop {
        reply: oneshot::Sender<Transition>,
    },
    ForceCheck {
        reply: oneshot::Sender<Transition>,
    },
    Reset {
        reply: oneshot::Sender<Transition>,
    },
}

type CheckResult = Result<CheckOutcome, AvailabilityError>;

struct InFlightCheck {
    session_id: Uuid,
    handle: JoinHandle<CheckResult>,
}

/// Cloneable control surface for a running scheduler.
#[derive(Clone)]
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl MonitorHandle {
    /// Starts a fresh session. An empty target is rejected before anything changes.
    pub async fn start(&self, target: impl Into<String>) -> Result<Transition, MonitorError> {
        let target = target.into().trim().to_string();
        if target.is_empty() {
            return Err(MonitorError::InvalidTarget("target must not be empty".to_string()));
        }
        self.request(|reply| Command::Start { target, reply }).await
    }

    pub async fn stop(&self) -> Result<Transition, MonitorError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn force_check(&self) -> Result<Transition, MonitorError> {
        self.request(|reply| Command::ForceCheck { reply }).await
    }

    /// Clears the log and the displayed alert without touching the state machine.
    pub async fn reset(&self) -> Result<Transition, MonitorError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn request<F>(&self, build: F) -> Result<Transition, MonitorError>
    where
        F: FnOnce(oneshot::Sender<Transition>) -> Command,
    {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply))
            .await
            .map_err(|_| MonitorError::SchedulerClosed)?;
        rx.await.map_err(|_| MonitorError::SchedulerClosed)
    }
}

pub struct MonitorScheduler<R = StdRng> {
    client: Arc<dyn AvailabilityClient>,
    notifier: Arc<dyn Notifier>,
    backoff: BackoffGenerator<R>,
    session: MonitorSession,
    publisher: SnapshotPublisher,
    cmd_rx: mpsc::Receiver<Command>,
    deadline: Option<Instant>,
    in_flight: Option<InFlightCheck>,
}

impl<R> MonitorScheduler<R>
where
    R: Rng + Send + 'static,
{
    /// Spawns the scheduler task. It runs until every `MonitorHandle` is dropped.
    pub fn spawn(
        client: Arc<dyn AvailabilityClient>,
        notifier: Arc<dyn Notifier>,
        backoff: BackoffGenerator<R>,
    ) -> (MonitorHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let publisher = SnapshotPublisher::new();
        let handle = MonitorHandle {
            cmd_tx,
            snapshots: publisher.subscribe(),
        };
        let scheduler = MonitorScheduler {
            client,
            notifier,
            backoff,
            session: MonitorSession::default(),
            publisher,
            cmd_rx,
            deadline: None,
            in_flight: None,
        };
        let task = tokio::spawn(scheduler.run());
        (handle, task)
    }

    async fn run(mut self) {
        let (min_wait, max_wait) = self.backoff.bounds();
        info!(
            min_wait_secs = min_wait.as_secs(),
            max_wait_secs = max_wait.as_secs(),
            "Monitor scheduler started."
        );
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                (session_id, joined) = wait_for_check(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.complete_check(session_id, joined);
                }
                _ = wait_until(self.deadline) => {
                    self.deadline = None;
                    if self.session.state == MonitorState::Waiting {
                        self.begin_check();
                    }
                }
            }
        }
        if let Some(check) = self.in_flight.take() {
            check.handle.abort();
        }
        info!("Monitor scheduler shut down.");
    }

    fn handle_command(&mut self, cmd: Command) {
        let (transition, reply) = match cmd {
            Command::Start { target, reply } => (self.start(target), reply),
            Command::Stop { reply } => (self.stop(), reply),
            Command::ForceCheck { reply } => (self.force_check(), reply),
            Command::Reset { reply } => (self.reset(), reply),
        };
        // the caller may have given up waiting; the transition stands either way
        let _ = reply.send(transition);
    }

    fn start(&mut self, target: String) -> Transition {
        if self.session.state.is_running() {
            debug!(state = ?self.session.state, "Start ignored: a session is already running.");
            return Transition::Ignored;
        }
        // A check left over from the previous session can no longer affect anything.
        if let Some(stale) = self.in_flight.take() {
            debug!(session_id = %stale.session_id, "Aborting check from a previous session.");
            stale.handle.abort();
        }
        self.deadline = None;
        let session_id = self.session.begin(target);
        info!(session_id = %session_id, target = ?self.session.target, "Monitoring session started.");
        self.begin_check();
        Transition::Applied
    }

    fn stop(&mut self) -> Transition {
        if !self.session.state.is_running() {
            return Transition::Ignored;
        }
        self.deadline = None;
        self.session.next_check_at = None;
        self.session.state = MonitorState::Stopped;
        self.session.logs.push(STOPPED_BY_USER);
        info!(
            check_count = self.session.check_count,
            check_in_flight = self.in_flight.is_some(),
            "Monitoring session stopped by user."
        );
        self.publish();
        Transition::Applied
    }

    fn force_check(&mut self) -> Transition {
        if self.session.state != MonitorState::Waiting {
            debug!(state = ?self.session.state, "Force check ignored.");
            return Transition::Ignored;
        }
        info!("Forcing an immediate check.");
        self.deadline = None;
        self.begin_check();
        Transition::Applied
    }

    fn reset(&mut self) -> Transition {
        self.session.logs.clear();
        self.session.last_alert = None;
        self.publish();
        Transition::Applied
    }

    fn begin_check(&mut self) {
        let (Some(session_id), Some(target)) = (self.session.session_id, self.session.target.clone())
        else {
            return;
        };
        if self.in_flight.is_some() {
            warn!("A check is already in flight; not starting another.");
            return;
        }
        self.session.state = MonitorState::Checking;
        self.session.next_check_at = None;

        let client = Arc::clone(&self.client);
        let handle = tokio::spawn(async move { client.check_availability(&target).await });
        self.in_flight = Some(InFlightCheck { session_id, handle });
        debug!(session_id = %session_id, check_number = self.session.check_count + 1, "Check started.");
        self.publish();
    }

    fn complete_check(&mut self, session_id: Uuid, joined: Result<CheckResult, JoinError>) {
        if !self.session.is_current(session_id) {
            debug!(session_id = %session_id, "Discarding result of a previous session's check.");
            return;
        }
        let still_running = self.session.state == MonitorState::Checking;
        let now = Utc::now();

        let outcome = match joined {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("check task failed: {e}")),
        };

        match outcome {
            Ok(outcome) => {
                self.session.logs.extend(outcome.logs);
                self.session.check_count += 1;
                self.session.last_check_at = Some(now);
                if let Some(data) = outcome.data {
                    self.session.journey_info = Some(data);
                }
                info!(
                    check_count = self.session.check_count,
                    success = outcome.success,
                    is_available = outcome.is_available,
                    "Check completed."
                );
                if outcome.success && still_running {
                    if outcome.is_available {
                        if self.session.dedup.on_available() {
                            self.raise_alert();
                        } else {
                            debug!("Still available; alert already raised for this run.");
                        }
                    } else {
                        self.session.dedup.on_unavailable();
                    }
                }
            }
            Err(message) => {
                warn!(error = %message, "Availability check failed.");
                self.session.logs.push(format!("Error: {message}"));
                self.session.check_count += 1;
                self.session.last_check_at = Some(now);
            }
        }

        if still_running {
            self.schedule_next(now);
        } else {
            self.publish();
        }
    }

    fn raise_alert(&mut self) {
        let journey = self.session.journey_info.clone().unwrap_or_else(|| JourneyInfo {
            name: self.session.target.clone().unwrap_or_default(),
            status_text: Some("AVAILABLE".to_string()),
            ..JourneyInfo::default()
        });
        warn!(
            train = %journey.name,
            price = %journey.price,
            seats = %journey.seats_label(),
            "Seat available, raising alert."
        );
        self.notifier.notify(&journey);
        self.session.last_alert = Some(journey);
    }

    fn schedule_next(&mut self, now: DateTime<Utc>) {
        let delay = self.backoff.next();
        self.deadline = Instant::now().checked_add(delay);
        if self.deadline.is_none() {
            warn!(delay_secs = delay.as_secs(), "Wait does not fit the clock; only a forced check will run.");
        }
        self.session.state = MonitorState::Waiting;
        self.session.next_check_at = i64::try_from(delay.as_secs())
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|wait| now.checked_add_signed(wait));
        self.session
            .logs
            .push(format!("Waiting {}s until the next check", delay.as_secs()));
        debug!(delay_secs = delay.as_secs(), "Next check scheduled.");
        self.publish();
    }

    fn publish(&self) {
        self.publisher.publish(self.session.snapshot());
    }
}

async fn wait_for_check(in_flight: &mut Option<InFlightCheck>) -> (Uuid, Result<CheckResult, JoinError>) {
    match in_flight {
        Some(check) => (check.session_id, (&mut check.handle).await),
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
