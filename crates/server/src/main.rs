use anyhow::{Context, Result};
use shortlink_common::AppConfig;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/shortlink.yaml".to_string());

    info!(config_path = %config_path, "starting shortlink");

    let config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;
    info!(
        listen = %config.server.listen,
        rps = config.rate_limit.rps,
        burst = config.rate_limit.burst,
        links = config.links.len(),
        "configuration loaded"
    );

    let state = shortlink_server::build_state(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = state.gate.as_ref().map(|gate| {
        gate.start_sweeper_with_shutdown(
            config.rate_limit.sweep_interval(),
            config.rate_limit.stale_after(),
            shutdown_rx,
        )
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    };

    let result = shortlink_server::run_server(state, &config.server.listen, shutdown).await;

    let _ = shutdown_tx.send(true);
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    if let Err(ref e) = result {
        error!(error = %e, "server error");
    }
    result
}
