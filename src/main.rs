use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;

use timerdeck::config::{self, Config};
use timerdeck::logging;
use timerdeck::shell::{self, Shell};
use timerdeck::{FileKeyValueStore, PersistenceBridge, RuntimeOptions, TimerRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config::ensure_directories(&config)?;

    // Initialize file logging BEFORE any tracing calls
    let (log_file_info, _guard) = logging::init_file_logging(&config::logs_dir())?;

    if let Ok(count) =
        logging::cleanup_old_logs_with_retention(&config::logs_dir(), config.log_retention_days)
    {
        if count > 0 {
            tracing::info!("Cleaned up {} old log files", count);
        }
    }

    tracing::info!("Logging to: {}", log_file_info.path.display());

    let store = FileKeyValueStore::new(&config.data_dir);
    tracing::info!("Storing timers in: {}", store.dir().display());
    let bridge = PersistenceBridge::new(Arc::new(store));
    let runtime = TimerRuntime::load(bridge, RuntimeOptions::from(&config));
    let shell = Shell::new(runtime.clone());

    let mut events = runtime.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = shell::render_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event printer lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", shell::HELP);
    tokio::select! {
        _ = shell.run(BufReader::new(tokio::io::stdin())) => {}
        _ = tokio::signal::ctrl_c() => runtime.shutdown(),
    }
    Ok(())
}
