//! Interactive terminal monitor: watches one booking page until told to stop.
use chrono::Utc;
use clap::Parser;
use seat_hunter::availability::{AvailabilityClient, RemoteClient, ScrapingClient};
use seat_hunter::config::MonitorConfig;
use seat_hunter::http_server::is_http_url;
use seat_hunter::logging::init_file_logging;
use seat_hunter::monitor::{
    BackoffGenerator, MonitorHandle, MonitorScheduler, SessionSnapshot, Transition, format_countdown,
};
use seat_hunter::notifications::{ALERT_TITLE, ChannelNotifier, ConsoleNotifier, NotifierSet, alert_message};
use seat_hunter::version::VERSION;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

const HELP: &str = "commands: check | stop | start | reset | status | quit";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Booking page URL to watch
    target: String,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Minimum wait between checks, in seconds
    #[arg(long)]
    min_wait: Option<u64>,

    /// Maximum wait between checks, in seconds
    #[arg(long)]
    max_wait: Option<u64>,

    /// Delegate checks to a seat-hunter-server at this base URL
    #[arg(long, value_name = "API_URL")]
    remote: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("seat-hunter version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();
    let target = args.target.trim().to_string();
    if !is_http_url(&target) {
        return Err("Enter a valid booking URL (http/https)".into());
    }

    let mut config = MonitorConfig::load(args.config.as_deref())?;
    if let Some(min_wait) = args.min_wait {
        config.min_wait_secs = min_wait;
    }
    if let Some(max_wait) = args.max_wait {
        config.max_wait_secs = max_wait;
    }
    config.validate()?;

    init_file_logging(&config.log_dir, "monitor.log");
    info!(version = VERSION, target = %target, "Starting seat-hunter monitor.");

    let client: Arc<dyn AvailabilityClient> = match args.remote.or(config.api_url.clone()) {
        Some(api_url) => {
            let remote = RemoteClient::new(&api_url, config.request_timeout())?;
            println!("Checking through {}", remote.endpoint());
            Arc::new(remote)
        }
        None => Arc::new(ScrapingClient::new(&config.train_name, config.request_timeout())?),
    };

    let mut notifier = NotifierSet::new().with(Arc::new(ConsoleNotifier::default()));
    let channels = ChannelNotifier::new(config.channels.clone());
    if !channels.is_empty() {
        notifier = notifier.with(Arc::new(channels));
    }

    let backoff = BackoffGenerator::new(config.min_wait_secs, config.max_wait_secs)?;
    let (handle, scheduler_task) = MonitorScheduler::spawn(client, Arc::new(notifier), backoff);
    let printer = tokio::spawn(print_updates(handle.subscribe()));

    println!(
        "Watching {} for {} (waits {}-{}s). {HELP}",
        target, config.train_name, config.min_wait_secs, config.max_wait_secs
    );
    handle.start(target.clone()).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Flow::Quit = run_command(&handle, &target, line.trim()).await? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin; commands disabled.");
                    stdin_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C.");
                }
                handle.stop().await?;
                break;
            }
        }
    }

    drop(handle);
    scheduler_task.await?;
    printer.await?;
    info!("Monitor exited.");
    Ok(())
}

async fn run_command(
    handle: &MonitorHandle,
    target: &str,
    command: &str,
) -> Result<Flow, Box<dyn std::error::Error + Send + Sync>> {
    let transition = match command {
        "" => return Ok(Flow::Continue),
        "check" => handle.force_check().await?,
        "stop" => handle.stop().await?,
        "start" => handle.start(target).await?,
        "reset" => handle.reset().await?,
        "status" => {
            print_status(&handle.snapshot());
            return Ok(Flow::Continue);
        }
        "quit" | "exit" => {
            handle.stop().await?;
            return Ok(Flow::Quit);
        }
        other => {
            println!("Unknown command {other:?}. {HELP}");
            return Ok(Flow::Continue);
        }
    };
    if transition == Transition::Ignored {
        println!("'{command}' does nothing while {}.", handle.snapshot().state);
    }
    Ok(Flow::Continue)
}

fn print_status(snapshot: &SessionSnapshot) {
    let countdown = format_countdown(snapshot.seconds_until_next_check(Utc::now()));
    println!(
        "state: {}  checks: {}  next check in: {}",
        snapshot.state, snapshot.check_count, countdown
    );
    if let Some(journey) = &snapshot.journey_info {
        println!(
            "last seen: {} {} ({})",
            journey.name,
            journey.price,
            journey.seats_label()
        );
    }
    if let Some(alert) = &snapshot.last_alert {
        println!("last alert: {}", alert_message(alert).replace('\n', " / "));
    }
}

/// Echoes new log lines, state changes and fresh alerts until the scheduler goes away.
async fn print_updates(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut printed = 0;
    let mut session_id = None;
    let mut state = None;
    let mut alert = None;

    loop {
        {
            let snapshot = snapshots.borrow_and_update();
            // new session or a reset: the log starts over
            if snapshot.session_id != session_id || snapshot.logs.len() < printed {
                session_id = snapshot.session_id;
                printed = 0;
            }
            for line in &snapshot.logs[printed..] {
                println!("{line}");
            }
            printed = snapshot.logs.len();

            if snapshot.last_alert.is_some() && snapshot.last_alert != alert {
                if let Some(journey) = &snapshot.last_alert {
                    println!("*** {ALERT_TITLE} {} ***", alert_message(journey).replace('\n', " / "));
                }
            }
            alert = snapshot.last_alert.clone();

            if state != Some(snapshot.state) {
                state = Some(snapshot.state);
                let countdown = format_countdown(snapshot.seconds_until_next_check(Utc::now()));
                match snapshot.next_check_at {
                    Some(_) => println!("[{}] next check in {countdown}", snapshot.state),
                    None => println!("[{}]", snapshot.state),
                }
            }
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
