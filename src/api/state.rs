use crate::config::WayguardConfig;
use crate::detect::engine::AlertEngine;
use crate::detect::incident::IncidentManager;
use crate::detect::DetectionConfig;
use crate::storage::Pool;
use crate::tracking::SessionStore;
use anyhow::{Context, Result};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub incidents: IncidentManager,
    pub engine: AlertEngine,
    pub detection: DetectionConfig,
    pub history_limit: usize,
}

impl AppState {
    pub fn new(pool: Pool, config: &WayguardConfig) -> Result<Self> {
        let detection = config
            .detection
            .to_config()
            .context("invalid detection thresholds")?;
        let engine = AlertEngine::from_config(&config.alert, &config.detection)
            .context("failed to set up alert backend")?;

        let history_limit = config.storage.history_limit.max(2);
        // One fix per second is the densest rate senders are expected to use.
        let window_secs = (detection.window_millis() / 1000.0).ceil() as usize;
        if history_limit < window_secs {
            warn!(
                history_limit,
                window_secs,
                "storage.history_limit is smaller than the inactivity window at 1 fix/s"
            );
        }

        Ok(Self {
            store: SessionStore::new(pool.clone()),
            incidents: IncidentManager::new(pool),
            engine,
            detection,
            history_limit,
        })
    }
}
