use clap::Parser;
use seat_hunter::availability::{AvailabilityClient, scraper::ScrapingClient};
use seat_hunter::config::MonitorConfig;
use seat_hunter::http_server::{AppState, create_router};
use seat_hunter::logging::init_logging;
use seat_hunter::monitor::{BackoffGenerator, MonitorScheduler};
use seat_hunter::notifications::{ChannelNotifier, ConsoleNotifier, NotifierSet};
use seat_hunter::version::VERSION;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Manually check for --version before full parsing to keep the output simple.
    if std::env::args().any(|arg| arg == "--version") {
        println!("Server version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    let config = match MonitorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir, "server.log");
    info!("Starting seat-hunter server, version: {}", VERSION);

    let checker: Arc<dyn AvailabilityClient> =
        Arc::new(ScrapingClient::new(&config.train_name, config.request_timeout())?);

    let mut notifier = NotifierSet::new().with(Arc::new(ConsoleNotifier::default()));
    let channels = ChannelNotifier::new(config.channels.clone());
    if channels.is_empty() {
        info!("No notification channels configured; console alerts only.");
    } else {
        info!(channels = config.channels.len(), "Notification channels configured.");
        notifier = notifier.with(Arc::new(channels));
    }

    let backoff = BackoffGenerator::new(config.min_wait_secs, config.max_wait_secs)?;
    let (monitor, scheduler_task) =
        MonitorScheduler::spawn(Arc::clone(&checker), Arc::new(notifier), backoff);

    let state = AppState {
        monitor,
        checker,
        allowed_host: config.allowed_host.clone(),
    };
    let app = create_router(state, &config.frontend_origin);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!(address = %config.listen_address, train = %config.train_name, "HTTP server listening.");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error.");
        return Err(e.into());
    }

    // The router owned the last handle, so the scheduler winds down on its own.
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Monitor scheduler task failed.");
    }
    info!("Server shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C; running until killed.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
