//! wayguard -- live location sharing with inactivity and safe-zone alerts.
//!
//! A sender shares GPS fixes under a short tracking code; a receiver looks
//! the code up and is alerted when the sender stops moving for too long or
//! leaves a safe zone. The detection itself lives in [`detect::evaluate`];
//! everything else is plumbing around it.

pub mod alert;
pub mod api;
pub mod config;
pub mod detect;
pub mod geo;
pub mod monitor;
pub mod storage;
pub mod tracking;

use anyhow::{Context, Result};
use config::WayguardConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the config level.
pub fn init_logging(cfg: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));

    if cfg.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Start the wayguard daemon: API server and session monitor.
pub async fn serve(config: WayguardConfig) -> Result<()> {
    // 1. Initialize Storage
    let db_path = config.storage.db_path.clone();
    tracing::info!(db_path = %db_path.display(), "Initializing database");
    let pool = storage::open_pool(&db_path)?;

    // 2. Shared state
    let state = api::state::AppState::new(pool, &config)?;

    // 3. Start Monitor (background task)
    if config.monitor.enabled {
        let monitor_state = state.clone();
        let every = config.monitor.poll_interval();
        tokio::spawn(async move {
            monitor::run_monitor_loop(monitor_state, every).await;
        });
    } else {
        tracing::info!("Monitor disabled by configuration");
    }

    // 4. Start API Server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;
    let app = api::router(state);

    tracing::info!(%addr, "wayguard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
