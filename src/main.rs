use std::sync::Arc;

use chrono::Datelike;
use tracing::{info, warn};

use timeoff::compactor;
use timeoff::config::Config;
use timeoff::engine::Engine;
use timeoff::holiday::HolidayCalendar;
use timeoff::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    timeoff::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(MemoryStore::open(config.wal_path())?);

    let holidays = match &config.holidays_file {
        Some(path) => HolidayCalendar::load(path)?,
        None => HolidayCalendar::empty(),
    };
    let engine = Engine::new(store.clone()).with_holidays(Arc::new(holidays));
    let year = chrono::Utc::now().year();

    info!("timeoff started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  wal: {}", config.wal_path().display());
    info!("  rows: {:?}", store.stats());
    info!("  holidays in {year}: {}", engine.holidays(year, None).len());
    info!(
        "  compaction: threshold={} every {}s",
        config.compact_threshold,
        config.compact_interval.as_secs()
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let compactor_task = tokio::spawn(compactor::run_compactor(
        store.clone(),
        config.compact_threshold,
        config.compact_interval,
    ));

    shutdown_signal().await?;
    info!("shutdown signal received");
    compactor_task.abort();

    if let Err(e) = store.compact_wal().await {
        warn!("final compaction failed: {e}");
    }

    info!("timeoff stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
