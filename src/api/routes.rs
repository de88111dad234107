//! API route definitions.

use super::state::AppState;
use super::ApiError;
use crate::detect::engine::EvaluationInput;
use crate::geo::{Coordinate, LocationSample, SafeZone};
use crate::monitor::assess_session;
use crate::tracking::normalize_code;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/evaluate", post(evaluate_once))
        .route("/sessions", post(start_session))
        .route("/sessions/{code}", get(get_session).delete(stop_session))
        .route("/sessions/{code}/locations", post(push_location))
        .route("/sessions/{code}/safe-zone", put(set_safe_zone))
        .route("/sessions/{code}/alert", get(session_alert))
        .route("/sessions/{code}/incidents", get(list_incidents))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "alertBackend": state.engine.backend_name()
        },
        "meta": meta()
    }))
}

/// Stateless evaluation of caller-supplied data.
async fn evaluate_once(
    State(state): State<AppState>,
    Json(body): Json<EvaluationInput>,
) -> Result<Json<Value>, ApiError> {
    let a = state.engine.assess_input(body).await?;

    let kinds: Vec<_> = a.verdict.kinds().iter().collect();
    Ok(Json(json!({
        "data": {
            "alertMessage": a.alert_message,
            "anomalyDetected": a.verdict.anomaly_detected(),
            "anomalyType": if kinds.is_empty() { None } else { Some(kinds) },
            "verdict": a.verdict,
            "messageSource": a.message_source
        },
        "meta": meta()
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationBody {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timestamp_millis: Option<i64>,
}

impl LocationBody {
    fn validate(&self) -> Result<(), ApiError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if !(lat_ok && lon_ok) {
            return Err(ApiError::BadRequest(format!(
                "coordinates out of range: {}, {}",
                self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<LocationBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    body.validate()?;
    let at = body.timestamp_millis.unwrap_or_else(now_millis);
    let session = state
        .store
        .create(Coordinate::new(body.latitude, body.longitude), at)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": session, "meta": meta() })),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let code = normalize_code(&code)?;
    let session = state.store.get(&code)?;
    let history = state.store.history(&code, state.history_limit)?;
    Ok(Json(json!({
        "data": { "session": session, "history": history },
        "meta": meta()
    })))
}

async fn stop_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, ApiError> {
    let code = normalize_code(&code)?;
    state.store.deactivate(&code)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn push_location(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<LocationBody>,
) -> Result<Json<Value>, ApiError> {
    let code = normalize_code(&code)?;
    body.validate()?;
    let sample = LocationSample::new(
        body.latitude,
        body.longitude,
        body.timestamp_millis.unwrap_or_else(now_millis),
    );
    let session = state.store.append_location(&code, sample)?;
    Ok(Json(json!({ "data": session, "meta": meta() })))
}

#[derive(Debug, Deserialize)]
struct SafeZoneBody {
    #[serde(default)]
    vertices: Vec<Coordinate>,
    #[serde(default)]
    label: Option<String>,
}

async fn set_safe_zone(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<SafeZoneBody>,
) -> Result<Json<Value>, ApiError> {
    let code = normalize_code(&code)?;
    let zone = SafeZone::new(body.vertices);
    // A label without a zone has nothing to describe.
    let label = zone.as_ref().and(body.label.as_deref());
    let session = state.store.set_safe_zone(&code, zone.as_ref(), label)?;
    Ok(Json(json!({ "data": session, "meta": meta() })))
}

async fn session_alert(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let code = normalize_code(&code)?;
    let (session, assessment) = assess_session(&state, &code).await?;
    Ok(Json(json!({
        "data": {
            "code": session.code,
            "location": session.last_location,
            "assessment": assessment
        },
        "meta": meta()
    })))
}

#[derive(Debug, Deserialize)]
struct IncidentQuery {
    #[serde(default = "default_incident_limit")]
    limit: usize,
}

fn default_incident_limit() -> usize {
    20
}

async fn list_incidents(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(q): Query<IncidentQuery>,
) -> Result<Json<Value>, ApiError> {
    let code = normalize_code(&code)?;
    // Distinguish "unknown code" from "no incidents yet".
    state.store.get(&code)?;
    let incidents = state.incidents.list_recent(&code, q.limit.min(500))?;
    Ok(Json(json!({
        "data": incidents,
        "meta": { "total": incidents.len() }
    })))
}
