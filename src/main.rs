use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use nimbus::config::CollectorConfig;
use nimbus::fetch::OpenMeteoClient;
use nimbus::queue::QueuePublisher;
use nimbus::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nimbus=info".into()),
        )
        .init();

    let config = CollectorConfig::from_env();

    info!(
        location = %config.site.location,
        latitude = config.site.latitude,
        longitude = config.site.longitude,
        interval_mins = config.schedule.interval.as_secs() / 60,
        queue = %config.broker.subject,
        broker = %config.broker.url,
        "Weather collector starting"
    );

    let source = OpenMeteoClient::new(config.api_url.clone(), config.site.clone())
        .context("Failed to build weather API client")?;
    let sink = QueuePublisher::new(config.broker.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let scheduler = Scheduler::new(config.schedule.clone(), config.site.clone(), source, sink);
    scheduler.run(shutdown_rx).await
}
