//! Deterministic alert text built from the verdict fields alone.
//!
//! Used when no text backend is configured, and as the fallback when the
//! configured backend fails.

use super::{AlertError, AlertGenerator, AlertRequest};
use askama::Template;

const DEFAULT_SUBJECT: &str = "The person you are following";
const DEFAULT_ZONE: &str = "safe area";

#[derive(Template)]
#[template(path = "alert.txt")]
struct AlertTemplate<'a> {
    anomaly_detected: bool,
    subject: &'a str,
    location: &'a str,
    inactivity_minutes: Option<u64>,
    outside_zone: bool,
    zone: &'a str,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateAlertGenerator;

impl TemplateAlertGenerator {
    pub fn render(&self, request: &AlertRequest) -> Result<String, AlertError> {
        let tpl = AlertTemplate {
            anomaly_detected: request.anomaly_detected,
            subject: request.persona_names.sender.as_deref().unwrap_or(DEFAULT_SUBJECT),
            location: &request.display_location,
            inactivity_minutes: request.inactivity_duration_minutes,
            outside_zone: request.is_outside_safe_zone,
            zone: request.zone_description.as_deref().unwrap_or(DEFAULT_ZONE),
        };
        let text = tpl.render().map_err(|e| AlertError::Template(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

#[async_trait::async_trait]
impl AlertGenerator for TemplateAlertGenerator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn generate(&self, request: &AlertRequest) -> Result<String, AlertError> {
        self.render(request)
    }
}
