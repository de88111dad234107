//! Alert message generation.
//!
//! The verdict is computed locally; a text backend only turns it into a
//! sentence for the receiver. Any backend that accepts an [`AlertRequest`]
//! and returns an [`AlertResponse`] can be plugged in.

pub mod http;
pub mod template;

use crate::detect::{AnomalyKind, AnomalyVerdict};
use crate::geo::{display_location, Coordinate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert backend unreachable: {0}")]
    Unreachable(String),
    #[error("alert backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("alert backend response could not be decoded: {0}")]
    Decode(String),
    #[error("alert backend returned an empty message")]
    EmptyMessage,
    #[error("failed to render alert template: {0}")]
    Template(String),
}

/// Optional names used to personalise the message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

/// Everything a text backend needs to phrase an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    pub display_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivity_duration_minutes: Option<u64>,
    pub is_outside_safe_zone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_description: Option<String>,
    #[serde(default)]
    pub persona_names: PersonaNames,
    pub anomaly_detected: bool,
    pub kinds: BTreeSet<AnomalyKind>,
}

impl AlertRequest {
    /// Build a request from a verdict. The zone description is only attached
    /// when the person is actually outside the zone.
    pub fn from_verdict(
        verdict: &AnomalyVerdict,
        location: Coordinate,
        zone_description: &str,
        persona_names: PersonaNames,
    ) -> Self {
        Self {
            display_location: display_location(location),
            inactivity_duration_minutes: verdict.inactivity_duration_minutes(),
            is_outside_safe_zone: verdict.is_outside_safe_zone(),
            zone_description: verdict
                .is_outside_safe_zone()
                .then(|| zone_description.to_string()),
            persona_names,
            anomaly_detected: verdict.anomaly_detected(),
            kinds: verdict.kinds().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub alert_message: String,
}

/// A text-generation backend.
#[async_trait::async_trait]
pub trait AlertGenerator: Send + Sync {
    /// Short identifier used in logs and recorded incidents.
    fn name(&self) -> &'static str;

    /// Produce a human-readable message for the request.
    async fn generate(&self, request: &AlertRequest) -> Result<String, AlertError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{evaluate, DetectionConfig};
    use crate::geo::{LocationSample, SafeZone};

    fn square() -> SafeZone {
        SafeZone::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_request_from_quiet_verdict() {
        let cfg = DetectionConfig::new(5.0, 10.0).unwrap();
        let current = LocationSample::new(0.5, 0.5, 0);
        let verdict = evaluate(&current, &[], Some(&square()), &cfg);

        let req = AlertRequest::from_verdict(&verdict, current.coordinate(), "home", PersonaNames::default());

        assert_eq!(req.display_location, "0.5000 N, 0.5000 E");
        assert!(!req.anomaly_detected);
        assert!(req.zone_description.is_none());
        assert!(req.kinds.is_empty());
    }

    #[test]
    fn test_request_carries_zone_description_when_outside() {
        let cfg = DetectionConfig::new(5.0, 10.0).unwrap();
        let current = LocationSample::new(2.0, 2.0, 0);
        let verdict = evaluate(&current, &[], Some(&square()), &cfg);

        let names = PersonaNames {
            sender: Some("Ayse".to_string()),
            receiver: None,
        };
        let req = AlertRequest::from_verdict(&verdict, current.coordinate(), "home", names);

        assert!(req.is_outside_safe_zone);
        assert_eq!(req.zone_description.as_deref(), Some("home"));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["displayLocation"], "2.0000 N, 2.0000 E");
        assert_eq!(json["kinds"], serde_json::json!(["out_of_safe_zone"]));
        assert_eq!(json["personaNames"]["sender"], "Ayse");
        assert!(json.get("inactivityDurationMinutes").is_none());
    }
}
