use super::{AlertError, AlertGenerator, AlertRequest, AlertResponse};
use reqwest::Client;
use std::time::Duration;

/// Text backend reached over HTTP: the request is POSTed as JSON and an
/// `{"alertMessage": "..."}` body is expected back.
pub struct HttpAlertGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAlertGenerator {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl AlertGenerator for HttpAlertGenerator {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn generate(&self, request: &AlertRequest) -> Result<String, AlertError> {
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let resp = call
            .send()
            .await
            .map_err(|e| AlertError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AlertError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AlertResponse = resp
            .json()
            .await
            .map_err(|e| AlertError::Decode(e.to_string()))?;

        let message = parsed.alert_message.trim();
        if message.is_empty() {
            return Err(AlertError::EmptyMessage);
        }
        Ok(message.to_string())
    }
}
