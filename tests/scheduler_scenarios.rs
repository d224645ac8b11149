use async_trait::async_trait;
use seat_hunter::availability::{AvailabilityClient, AvailabilityError, CheckOutcome, JourneyInfo};
use seat_hunter::monitor::{
    BackoffGenerator, MonitorHandle, MonitorScheduler, MonitorState, STOPPED_BY_USER, SessionSnapshot,
    Transition,
};
use seat_hunter::notifications::Notifier;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type CheckResult = Result<CheckOutcome, AvailabilityError>;

/// Replays a fixed script, then reports "sold out" forever.
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<CheckResult>>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedClient {
    fn new(script: Vec<CheckResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityClient for ScriptedClient {
    async fn check_availability(&self, _target: &str) -> CheckResult {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(sold_out(None)))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<JourneyInfo>>,
}

impl RecordingNotifier {
    fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, journey: &JourneyInfo) {
        self.alerts.lock().unwrap().push(journey.clone());
    }
}

fn journey(price: &str, seats: &str) -> JourneyInfo {
    JourneyInfo {
        name: "BENGAWAN".to_string(),
        price: price.to_string(),
        remaining_seats: seats.to_string(),
        ..JourneyInfo::default()
    }
}

fn seats_left(data: Option<JourneyInfo>) -> CheckOutcome {
    CheckOutcome {
        success: true,
        is_available: true,
        logs: vec!["🟢 BENGAWAN: AVAILABLE (Sisa 2 Kursi)".to_string()],
        data,
    }
}

fn sold_out(data: Option<JourneyInfo>) -> CheckOutcome {
    CheckOutcome {
        success: true,
        is_available: false,
        logs: vec!["🔴 BENGAWAN: Habis / Sold Out".to_string()],
        data,
    }
}

fn spawn(client: Arc<ScriptedClient>, notifier: Arc<RecordingNotifier>) -> MonitorHandle {
    let backoff = BackoffGenerator::seeded(3, 5, 2024).unwrap();
    let (handle, _task) = MonitorScheduler::spawn(client, notifier, backoff);
    handle
}

async fn waiting_after(handle: &MonitorHandle, checks: u64) -> SessionSnapshot {
    let mut rx = handle.subscribe();
    let snapshot = rx
        .wait_for(|s| s.check_count == checks && s.state == MonitorState::Waiting)
        .await
        .unwrap()
        .clone();
    snapshot
}

fn assert_wait_in_range(snapshot: &SessionSnapshot) {
    let last = snapshot.last_check_at.expect("a completed check");
    let next = snapshot.next_check_at.expect("an armed timer");
    let wait = (next - last).num_seconds();
    assert!((3..=5).contains(&wait), "wait of {wait}s outside [3, 5]");
}

#[tokio::test(start_paused = true)]
async fn alerts_once_per_available_run_then_stops_cleanly() {
    let x = journey("Rp 74.000,-", "Habis");
    let y = journey("Rp 74.000,-", "Sisa 2 Kursi");
    let client = ScriptedClient::new(vec![
        Ok(sold_out(Some(x.clone()))),
        Ok(seats_left(Some(y.clone()))),
        Ok(seats_left(Some(y.clone()))),
    ]);
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = spawn(client.clone(), notifier.clone());

    assert_eq!(handle.start("target-A").await.unwrap(), Transition::Applied);

    let first = waiting_after(&handle, 1).await;
    assert_eq!(first.journey_info, Some(x));
    assert_eq!(notifier.count(), 0);
    assert_wait_in_range(&first);

    let second = waiting_after(&handle, 2).await;
    assert_eq!(notifier.count(), 1);
    assert_eq!(second.last_alert, Some(y.clone()));
    assert_wait_in_range(&second);

    let third = waiting_after(&handle, 3).await;
    assert_eq!(notifier.count(), 1);
    assert_wait_in_range(&third);

    assert_eq!(handle.stop().await.unwrap(), Transition::Applied);
    let stopped = handle.snapshot();
    assert_eq!(stopped.state, MonitorState::Stopped);
    assert!(stopped.next_check_at.is_none());
    assert_eq!(stopped.logs.last().map(String::as_str), Some(STOPPED_BY_USER));
    assert_eq!(notifier.alerts.lock().unwrap()[0], y);
}

#[tokio::test(start_paused = true)]
async fn checks_fire_within_the_configured_window() {
    let client = ScriptedClient::new(vec![]);
    let handle = spawn(client.clone(), Arc::new(RecordingNotifier::default()));

    handle.start("target-A").await.unwrap();
    waiting_after(&handle, 8).await;

    let times = client.call_times();
    assert_eq!(times.len(), 8);
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_secs(3) && gap <= Duration::from_secs(5),
            "gap of {gap:?} outside [3s, 5s]"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failures_count_as_checks_and_keep_the_cycle_alive() {
    let client = ScriptedClient::new(vec![
        Err(AvailabilityError::InvalidResponse("connection reset".to_string())),
        Ok(CheckOutcome::failed(vec!["Error: HTTP 502".to_string()])),
        Err(AvailabilityError::InvalidResponse("timed out".to_string())),
        Ok(sold_out(None)),
    ]);
    let handle = spawn(client.clone(), Arc::new(RecordingNotifier::default()));

    handle.start("target-A").await.unwrap();
    let snapshot = waiting_after(&handle, 4).await;

    assert_eq!(client.call_times().len(), 4);
    assert!(snapshot.logs.contains(&"Error: Invalid response: connection reset".to_string()));
    assert!(snapshot.logs.contains(&"Error: HTTP 502".to_string()));
    assert!(snapshot.logs.contains(&"Error: Invalid response: timed out".to_string()));
    assert_wait_in_range(&snapshot);
}

#[tokio::test(start_paused = true)]
async fn availability_after_a_sold_out_check_alerts_again() {
    let client = ScriptedClient::new(vec![
        Ok(seats_left(None)),
        Ok(seats_left(None)),
        Ok(sold_out(None)),
        Ok(seats_left(None)),
        Err(AvailabilityError::InvalidResponse("flaky".to_string())),
        Ok(seats_left(None)),
    ]);
    let notifier = Arc::new(RecordingNotifier::default());
    let handle = spawn(client, notifier.clone());

    handle.start("target-A").await.unwrap();
    waiting_after(&handle, 6).await;

    // an error between two available checks does not end the run
    assert_eq!(notifier.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_while_waiting_prevents_further_checks() {
    let client = ScriptedClient::new(vec![]);
    let handle = spawn(client.clone(), Arc::new(RecordingNotifier::default()));

    handle.start("target-A").await.unwrap();
    waiting_after(&handle, 2).await;
    assert_eq!(handle.stop().await.unwrap(), Transition::Applied);

    tokio::time::sleep(Duration::from_secs(60)).await;

    let snapshot = handle.snapshot();
    assert_eq!(client.call_times().len(), 2);
    assert_eq!(snapshot.check_count, 2);
    assert_eq!(snapshot.state, MonitorState::Stopped);
    assert_eq!(snapshot.logs.last().map(String::as_str), Some(STOPPED_BY_USER));
    assert_eq!(handle.force_check().await.unwrap(), Transition::Ignored);

    // a new start begins from scratch
    assert_eq!(handle.start("target-B").await.unwrap(), Transition::Applied);
    let restarted = waiting_after(&handle, 1).await;
    assert_eq!(restarted.target.as_deref(), Some("target-B"));
    assert!(!restarted.logs.iter().any(|line| line == STOPPED_BY_USER));
}
