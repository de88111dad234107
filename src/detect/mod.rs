//! Anomaly detection, alert assembly and incident recording.

pub mod anomaly;
pub mod engine;
pub mod incident;

pub use self::anomaly::{evaluate, AnomalyVerdict};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("inactivity threshold must be at least 1 minute, got {0}")]
    InactivityThreshold(f64),
    #[error("movement threshold must be at least 1 metre, got {0}")]
    MovementThreshold(f64),
}

/// Default cumulative movement (metres) below which the person counts as stationary.
pub const DEFAULT_SAFE_ZONE_THRESHOLD_M: f64 = 10.0;

/// Thresholds for a single evaluation. Only constructible through
/// [`DetectionConfig::new`], so every instance is valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetectionConfig", rename_all = "camelCase")]
pub struct DetectionConfig {
    inactivity_threshold_minutes: f64,
    safe_zone_threshold_meters: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetectionConfig {
    inactivity_threshold_minutes: f64,
    #[serde(default = "default_safe_zone_threshold")]
    safe_zone_threshold_meters: f64,
}

fn default_safe_zone_threshold() -> f64 {
    DEFAULT_SAFE_ZONE_THRESHOLD_M
}

impl TryFrom<RawDetectionConfig> for DetectionConfig {
    type Error = DetectError;

    fn try_from(raw: RawDetectionConfig) -> Result<Self, Self::Error> {
        DetectionConfig::new(raw.inactivity_threshold_minutes, raw.safe_zone_threshold_meters)
    }
}

impl DetectionConfig {
    /// Validate thresholds. Anything below 1 (or NaN/infinite) is rejected
    /// rather than clamped.
    pub fn new(inactivity_threshold_minutes: f64, safe_zone_threshold_meters: f64) -> Result<Self, DetectError> {
        if !inactivity_threshold_minutes.is_finite() || inactivity_threshold_minutes < 1.0 {
            return Err(DetectError::InactivityThreshold(inactivity_threshold_minutes));
        }
        if !safe_zone_threshold_meters.is_finite() || safe_zone_threshold_meters < 1.0 {
            return Err(DetectError::MovementThreshold(safe_zone_threshold_meters));
        }
        Ok(Self {
            inactivity_threshold_minutes,
            safe_zone_threshold_meters,
        })
    }

    pub fn inactivity_threshold_minutes(&self) -> f64 {
        self.inactivity_threshold_minutes
    }

    pub fn safe_zone_threshold_meters(&self) -> f64 {
        self.safe_zone_threshold_meters
    }

    /// Inactivity window length in milliseconds.
    pub fn window_millis(&self) -> f64 {
        self.inactivity_threshold_minutes * 60_000.0
    }
}

/// Kinds of anomaly the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Inactivity,
    OutOfSafeZone,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyKind::Inactivity => write!(f, "inactivity"),
            AnomalyKind::OutOfSafeZone => write!(f, "out_of_safe_zone"),
        }
    }
}

/// Severity levels for recorded incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Both kinds at once is the most urgent case.
    pub fn for_verdict(verdict: &AnomalyVerdict) -> Self {
        match verdict.kinds().len() {
            0 => Severity::Info,
            1 => Severity::Warning,
            _ => Severity::Critical,
        }
    }
}

/// A recorded alert with its verdict and message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: uuid::Uuid,
    pub tracking_code: String,
    pub severity: Severity,
    pub kinds: Vec<AnomalyKind>,
    pub message: String,
    pub message_source: String,
    pub sample_timestamp_millis: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_below_minimum() {
        assert_eq!(
            DetectionConfig::new(0.5, 10.0),
            Err(DetectError::InactivityThreshold(0.5))
        );
        assert_eq!(
            DetectionConfig::new(5.0, 0.0),
            Err(DetectError::MovementThreshold(0.0))
        );
        assert!(DetectionConfig::new(f64::NAN, 10.0).is_err());
        assert!(DetectionConfig::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_config_deserialize_defaults_movement_threshold() {
        let cfg: DetectionConfig = serde_json::from_str(r#"{"inactivityThresholdMinutes": 5}"#).unwrap();
        assert_eq!(cfg.inactivity_threshold_minutes(), 5.0);
        assert_eq!(cfg.safe_zone_threshold_meters(), 10.0);
        assert_eq!(cfg.window_millis(), 300_000.0);
    }

    #[test]
    fn test_config_deserialize_validates() {
        let res: Result<DetectionConfig, _> =
            serde_json::from_str(r#"{"inactivityThresholdMinutes": 0, "safeZoneThresholdMeters": 10}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_string(&AnomalyKind::OutOfSafeZone).unwrap(), "\"out_of_safe_zone\"");
        assert_eq!(AnomalyKind::Inactivity.to_string(), "inactivity");
    }
}
