//! Background evaluation of active tracking sessions.
//!
//! Each tick lists the active sessions and evaluates those that received a
//! fix since the previous evaluation, so every fresh sample is assessed once.

use crate::api::state::AppState;
use crate::detect::engine::{AlertContext, Assessment};
use crate::tracking::{TrackingError, TrackingSession};
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Evaluate the latest fix of an active session against its stored timeline.
pub async fn assess_session(state: &AppState, code: &str) -> Result<(TrackingSession, Assessment), TrackingError> {
    let session = state.store.get_active(code)?;
    let newest = session.last_location.timestamp_millis;
    let since = newest.saturating_sub(state.detection.window_millis().ceil() as i64);

    let mut samples = state.store.window(code, since, state.history_limit)?;
    if samples.len() >= state.history_limit {
        warn!(
            %code,
            cap = state.history_limit,
            "inactivity window truncated by storage.history_limit"
        );
    }
    // A session always has at least its opening fix.
    let current = samples.pop().unwrap_or(session.last_location);

    let ctx = AlertContext {
        zone_description: session.zone_label.clone(),
        ..AlertContext::default()
    };
    let assessment = state
        .engine
        .assess(&current, &samples, session.safe_zone.as_ref(), &state.detection, &ctx)
        .await;

    Ok((session, assessment))
}

/// Main monitor loop. Runs until the task is dropped.
pub async fn run_monitor_loop(state: AppState, every: Duration) {
    info!(interval_secs = every.as_secs(), "Monitor started");

    let mut interval = tokio::time::interval(every);
    let mut last_evaluated: HashMap<String, i64> = HashMap::new();

    loop {
        interval.tick().await;

        match poll_once(&state, &mut last_evaluated).await {
            Ok(0) => {}
            Ok(n) => debug!(sessions = n, "Monitor pass complete"),
            Err(e) => error!("Monitor pass failed: {:#}", e),
        }
    }
}

/// One monitor pass. Returns how many sessions were evaluated.
pub async fn poll_once(state: &AppState, last_evaluated: &mut HashMap<String, i64>) -> Result<usize> {
    let store = state.store.clone();
    let sessions = tokio::task::spawn_blocking(move || store.list_active()).await??;
    Ok(poll_sessions(state, sessions, last_evaluated).await)
}

/// Evaluate the listed sessions that have a fix newer than the last one seen.
///
/// The listing may be stale by the time a session is evaluated, so the map
/// records the timestamp that was actually assessed.
async fn poll_sessions(
    state: &AppState,
    sessions: Vec<TrackingSession>,
    last_evaluated: &mut HashMap<String, i64>,
) -> usize {
    last_evaluated.retain(|code, _| sessions.iter().any(|s| &s.code == code));

    let mut evaluated = 0;
    for session in sessions {
        let newest = session.last_location.timestamp_millis;
        if last_evaluated.get(&session.code).is_some_and(|&seen| seen >= newest) {
            continue;
        }

        let (session, assessment) = match assess_session(state, &session.code).await {
            Ok(r) => r,
            // Stopped between listing and evaluation.
            Err(TrackingError::Inactive(_)) | Err(TrackingError::NotFound(_)) => continue,
            Err(e) => {
                warn!(code = %session.code, error = %e, "Failed to evaluate session");
                continue;
            }
        };
        last_evaluated.insert(session.code.clone(), assessment.sample_timestamp_millis);
        evaluated += 1;

        if assessment.verdict.anomaly_detected() {
            warn!(
                code = %session.code,
                kinds = ?assessment.verdict.kinds(),
                source = assessment.message_source.label(),
                "Anomaly detected"
            );
            if let Err(e) = state.incidents.record(&session.code, &assessment) {
                error!(code = %session.code, "Failed to record incident: {:#}", e);
            }
        }
    }

    evaluated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WayguardConfig;
    use crate::detect::AnomalyKind;
    use crate::geo::{Coordinate, LocationSample};
    use crate::storage::open_pool;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("test.db")).unwrap();
        let state = AppState::new(pool, &WayguardConfig::default()).unwrap();
        (dir, state)
    }

    #[tokio::test]
    async fn test_each_fresh_sample_is_evaluated_once() {
        let (_dir, state) = state();
        let code = state.store.create(Coordinate::new(0.0, 0.0), 0).unwrap().code;
        state
            .store
            .append_location(&code, LocationSample::new(0.0, 0.0, 299_000))
            .unwrap();
        state
            .store
            .append_location(&code, LocationSample::new(0.0, 0.0, 300_000))
            .unwrap();

        let mut seen = HashMap::new();
        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 1);
        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 0);

        let incidents = state.incidents.list_recent(&code, 10).unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].kinds, vec![AnomalyKind::Inactivity]);
        assert_eq!(incidents[0].message_source, "template");

        state
            .store
            .append_location(&code, LocationSample::new(0.0, 0.0, 600_000))
            .unwrap();
        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 1);
        assert_eq!(state.incidents.list_recent(&code, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dense_fixes_still_cover_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("test.db")).unwrap();
        let mut config = WayguardConfig::default();
        config.detection.inactivity_threshold_minutes = 10.0;
        config.storage.history_limit = 5_000;
        let state = AppState::new(pool, &config).unwrap();

        // Eleven stationary minutes at one fix per second.
        let code = state.store.create(Coordinate::new(0.0, 0.0), 0).unwrap().code;
        for i in 1..=660 {
            state
                .store
                .append_location(&code, LocationSample::new(0.0, 0.0, i * 1_000))
                .unwrap();
        }

        let (_, a) = assess_session(&state, &code).await.unwrap();
        assert!(a.verdict.has(AnomalyKind::Inactivity));
        assert_eq!(a.verdict.inactivity_duration_minutes(), Some(10));
        assert_eq!(a.sample_timestamp_millis, 660_000);
    }

    #[tokio::test]
    async fn test_stale_listing_records_the_assessed_fix() {
        let (_dir, state) = state();
        let code = state.store.create(Coordinate::new(0.0, 0.0), 0).unwrap().code;
        state
            .store
            .append_location(&code, LocationSample::new(0.0, 0.0, 299_000))
            .unwrap();
        let stale = state.store.list_active().unwrap();

        // A fix lands after the listing but before the evaluation.
        state
            .store
            .append_location(&code, LocationSample::new(0.0, 0.0, 300_000))
            .unwrap();

        let mut seen = HashMap::new();
        assert_eq!(poll_sessions(&state, stale, &mut seen).await, 1);
        assert_eq!(seen[&code], 300_000);

        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 0);
        assert_eq!(state.incidents.list_recent(&code, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quiet_session_records_nothing() {
        let (_dir, state) = state();
        let code = state.store.create(Coordinate::new(0.0, 0.0), 0).unwrap().code;
        state
            .store
            .append_location(&code, LocationSample::new(0.01, 0.0, 60_000))
            .unwrap();

        let mut seen = HashMap::new();
        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 1);
        assert!(state.incidents.list_recent(&code, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_sessions_are_forgotten() {
        let (_dir, state) = state();
        let code = state.store.create(Coordinate::new(0.0, 0.0), 0).unwrap().code;

        let mut seen = HashMap::new();
        poll_once(&state, &mut seen).await.unwrap();
        assert!(seen.contains_key(&code));

        state.store.deactivate(&code).unwrap();
        assert_eq!(poll_once(&state, &mut seen).await.unwrap(), 0);
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_assess_session_uses_zone_label() {
        let (_dir, state) = state();
        let code = state.store.create(Coordinate::new(2.0, 2.0), 0).unwrap().code;
        let zone = crate::geo::SafeZone::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
        ])
        .unwrap();
        state.store.set_safe_zone(&code, Some(&zone), Some("school")).unwrap();

        let (_, a) = assess_session(&state, &code).await.unwrap();
        assert!(a.verdict.has(AnomalyKind::OutOfSafeZone));
        assert!(a.alert_message.contains("outside the school"));
    }
}
