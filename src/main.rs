//! Bridge entry point: reads the environment, then runs the bridge until
//! Ctrl-C or SIGTERM, rebuilding it whenever it stops.

use std::time::Duration;
use tracing::{error, info};

use smoker_mqtt_bridge::{Bridge, BridgeConfig, Result};

/// Pause before rebuilding a bridge that stopped.
const RESTART_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BridgeConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let stopped = tokio::select! {
            result = run_bridge(&config) => result,
            _ = &mut shutdown => break,
        };

        if let Err(e) = stopped {
            error!("Bridge stopped: {}; restarting in {:?}", e, RESTART_DELAY);
        }

        tokio::select! {
            _ = tokio::time::sleep(RESTART_DELAY) => {}
            _ = &mut shutdown => break,
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn run_bridge(config: &BridgeConfig) -> Result<()> {
    Bridge::start(config).await?.run().await
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
