use crate::alert::http::HttpAlertGenerator;
use crate::alert::template::TemplateAlertGenerator;
use crate::alert::{AlertError, AlertGenerator, AlertRequest, PersonaNames};
use crate::config::{AlertConfig, DetectionSettings};
use crate::detect::{evaluate, AnomalyVerdict, DetectError, DetectionConfig, DEFAULT_SAFE_ZONE_THRESHOLD_M};
use crate::geo::{Coordinate, LocationSample, SafeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an assessment's message text came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MessageSource {
    /// Produced by the configured backend.
    Generated { backend: String },
    /// The backend failed; the text was rendered from the verdict alone.
    Fallback { reason: String },
}

impl MessageSource {
    pub fn label(&self) -> &str {
        match self {
            MessageSource::Generated { backend } => backend.as_str(),
            MessageSource::Fallback { .. } => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, MessageSource::Fallback { .. })
    }
}

/// Verdict plus the message shown to the receiver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub verdict: AnomalyVerdict,
    pub alert_message: String,
    pub message_source: MessageSource,
    pub sample_timestamp_millis: i64,
}

/// Per-call overrides for message personalisation.
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    pub zone_description: Option<String>,
    pub persona_names: PersonaNames,
}

fn default_movement_threshold() -> f64 {
    DEFAULT_SAFE_ZONE_THRESHOLD_M
}

/// Self-contained evaluation request, as accepted by the HTTP API and the CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    pub current: LocationSample,
    #[serde(default)]
    pub history: Vec<LocationSample>,
    /// Fewer than three vertices means "no zone".
    #[serde(default)]
    pub safe_zone: Option<Vec<Coordinate>>,
    pub inactivity_threshold_minutes: f64,
    #[serde(default = "default_movement_threshold")]
    pub safe_zone_threshold_meters: f64,
    #[serde(default)]
    pub zone_description: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub receiver_name: Option<String>,
}

/// Runs the detector and turns the verdict into a receiver-facing message.
///
/// The verdict is authoritative; the generator only supplies wording.
#[derive(Clone)]
pub struct AlertEngine {
    generator: Arc<dyn AlertGenerator>,
    fallback: TemplateAlertGenerator,
    zone_description: String,
    default_names: PersonaNames,
}

impl AlertEngine {
    pub fn new(generator: Arc<dyn AlertGenerator>, zone_description: impl Into<String>) -> Self {
        Self {
            generator,
            fallback: TemplateAlertGenerator,
            zone_description: zone_description.into(),
            default_names: PersonaNames::default(),
        }
    }

    /// HTTP backend when an endpoint is configured, templates otherwise.
    pub fn from_config(alert: &AlertConfig, detection: &DetectionSettings) -> Result<Self, AlertError> {
        let generator: Arc<dyn AlertGenerator> = match &alert.endpoint {
            Some(endpoint) => {
                info!(%endpoint, "using HTTP alert backend");
                Arc::new(HttpAlertGenerator::new(endpoint.clone(), alert.api_key.clone(), alert.timeout())?)
            }
            None => {
                info!("no alert endpoint configured, using template messages");
                Arc::new(TemplateAlertGenerator)
            }
        };

        let mut engine = Self::new(generator, detection.zone_description.clone());
        engine.default_names = PersonaNames {
            sender: alert.sender_name.clone(),
            receiver: alert.receiver_name.clone(),
        };
        Ok(engine)
    }

    pub fn backend_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Ask the backend for a message, surfacing its failure as-is.
    pub async fn compose(&self, request: &AlertRequest) -> Result<String, AlertError> {
        self.generator.generate(request).await
    }

    /// Evaluate and phrase. A backend failure falls back to the template and
    /// is reported through [`MessageSource::Fallback`]; the verdict is kept.
    pub async fn assess(
        &self,
        current: &LocationSample,
        history: &[LocationSample],
        safe_zone: Option<&SafeZone>,
        config: &DetectionConfig,
        ctx: &AlertContext,
    ) -> Assessment {
        let verdict = evaluate(current, history, safe_zone, config);
        debug!(
            kinds = ?verdict.kinds(),
            history = history.len(),
            has_zone = safe_zone.is_some(),
            "evaluated location"
        );

        let request = AlertRequest::from_verdict(
            &verdict,
            current.coordinate(),
            ctx.zone_description.as_deref().unwrap_or(&self.zone_description),
            self.merge_names(&ctx.persona_names),
        );

        let (alert_message, message_source) = match self.compose(&request).await {
            Ok(text) => (
                text,
                MessageSource::Generated {
                    backend: self.generator.name().to_string(),
                },
            ),
            Err(e) => {
                warn!(backend = self.generator.name(), error = %e, "alert generation failed, using template");
                (self.render_fallback(&request), MessageSource::Fallback { reason: e.to_string() })
            }
        };

        Assessment {
            verdict,
            alert_message,
            message_source,
            sample_timestamp_millis: current.timestamp_millis,
        }
    }

    /// Validate the thresholds in `input`, then [`assess`](Self::assess) it.
    pub async fn assess_input(&self, input: EvaluationInput) -> Result<Assessment, DetectError> {
        let config = DetectionConfig::new(input.inactivity_threshold_minutes, input.safe_zone_threshold_meters)?;
        let zone = input.safe_zone.and_then(SafeZone::new);
        let ctx = AlertContext {
            zone_description: input.zone_description,
            persona_names: PersonaNames {
                sender: input.sender_name,
                receiver: input.receiver_name,
            },
        };
        Ok(self
            .assess(&input.current, &input.history, zone.as_ref(), &config, &ctx)
            .await)
    }

    fn merge_names(&self, names: &PersonaNames) -> PersonaNames {
        PersonaNames {
            sender: names.sender.clone().or_else(|| self.default_names.sender.clone()),
            receiver: names.receiver.clone().or_else(|| self.default_names.receiver.clone()),
        }
    }

    fn render_fallback(&self, request: &AlertRequest) -> String {
        self.fallback.render(request).unwrap_or_else(|e| {
            warn!(error = %e, "template rendering failed");
            let kinds: Vec<String> = request.kinds.iter().map(|k| k.to_string()).collect();
            format!("Location {}: {}", request.display_location, kinds.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::AnomalyKind;
    use crate::geo::Coordinate;
    use std::sync::Mutex;

    struct FailingGenerator;

    #[async_trait::async_trait]
    impl AlertGenerator for FailingGenerator {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn generate(&self, _request: &AlertRequest) -> Result<String, AlertError> {
            Err(AlertError::Unreachable("connection refused".to_string()))
        }
    }

    /// Always claims everything is fine and remembers what it was asked.
    #[derive(Default)]
    struct CannedGenerator {
        seen: Mutex<Vec<AlertRequest>>,
    }

    #[async_trait::async_trait]
    impl AlertGenerator for CannedGenerator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, request: &AlertRequest) -> Result<String, AlertError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("Everything is fine.".to_string())
        }
    }

    fn stationary_outside() -> (LocationSample, Vec<LocationSample>, SafeZone) {
        let zone = SafeZone::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(1.0, 1.0),
            Coordinate::new(1.0, 0.0),
        ])
        .unwrap();
        let history = vec![LocationSample::new(2.0, 2.0, 0), LocationSample::new(2.0, 2.0, 299_000)];
        (LocationSample::new(2.0, 2.0, 300_000), history, zone)
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_but_keeps_verdict() {
        let engine = AlertEngine::new(Arc::new(FailingGenerator), "home area");
        let (current, history, zone) = stationary_outside();
        let cfg = DetectionConfig::new(5.0, 10.0).unwrap();

        let a = engine
            .assess(&current, &history, Some(&zone), &cfg, &AlertContext::default())
            .await;

        assert!(a.verdict.anomaly_detected());
        assert_eq!(a.verdict.kinds().len(), 2);
        assert!(a.message_source.is_fallback());
        assert!(a.alert_message.contains("outside the home area"));
        assert!(a.alert_message.contains("about 5 minutes"));
        match &a.message_source {
            MessageSource::Fallback { reason } => assert!(reason.contains("connection refused")),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generator_cannot_override_verdict() {
        let canned = Arc::new(CannedGenerator::default());
        let engine = AlertEngine::new(canned.clone(), "home area");
        let (current, history, zone) = stationary_outside();
        let cfg = DetectionConfig::new(5.0, 10.0).unwrap();

        let a = engine
            .assess(&current, &history, Some(&zone), &cfg, &AlertContext::default())
            .await;

        assert_eq!(a.alert_message, "Everything is fine.");
        assert_eq!(a.message_source.label(), "canned");
        assert!(a.verdict.has(AnomalyKind::Inactivity));
        assert!(a.verdict.has(AnomalyKind::OutOfSafeZone));

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].zone_description.as_deref(), Some("home area"));
        assert_eq!(seen[0].inactivity_duration_minutes, Some(5));
    }

    #[tokio::test]
    async fn test_context_overrides_defaults() {
        let canned = Arc::new(CannedGenerator::default());
        let mut alert_cfg = AlertConfig::default();
        alert_cfg.sender_name = Some("Grandpa".to_string());
        alert_cfg.receiver_name = Some("Elif".to_string());

        let mut engine = AlertEngine::from_config(&alert_cfg, &DetectionSettings::default()).unwrap();
        assert_eq!(engine.backend_name(), "template");
        engine.generator = canned.clone() as Arc<dyn AlertGenerator>;

        let (current, history, zone) = stationary_outside();
        let cfg = DetectionConfig::new(5.0, 10.0).unwrap();
        let ctx = AlertContext {
            zone_description: Some("school".to_string()),
            persona_names: PersonaNames {
                sender: Some("Deniz".to_string()),
                receiver: None,
            },
        };

        engine.assess(&current, &history, Some(&zone), &cfg, &ctx).await;

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen[0].zone_description.as_deref(), Some("school"));
        assert_eq!(seen[0].persona_names.sender.as_deref(), Some("Deniz"));
        assert_eq!(seen[0].persona_names.receiver.as_deref(), Some("Elif"));
    }

    #[tokio::test]
    async fn test_assess_input_from_json() {
        let engine = AlertEngine::new(Arc::new(TemplateAlertGenerator), "safe area");
        let input: EvaluationInput = serde_json::from_str(
            r#"{
                "current": {"latitude": 0.5, "longitude": 0.5, "timestampMillis": 0},
                "safeZone": [{"latitude": 0, "longitude": 0}],
                "inactivityThresholdMinutes": 5
            }"#,
        )
        .unwrap();
        assert_eq!(input.safe_zone_threshold_meters, 10.0);

        let a = engine.assess_input(input.clone()).await.unwrap();
        assert!(!a.verdict.anomaly_detected());
        assert_eq!(a.message_source.label(), "template");

        let mut bad = input;
        bad.safe_zone_threshold_meters = 0.5;
        assert_eq!(
            engine.assess_input(bad).await.unwrap_err(),
            DetectError::MovementThreshold(0.5)
        );
    }
}
