pub mod extract;
pub mod request;
pub mod service;

use crate::{
    config::GeminiConfig,
    error::{check_response, RelayError, Result},
    models::{Content, GenerateContentRequest, GenerateContentResponse, Part},
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub use extract::extract;
pub use request::{build_request, GenerationProfile};
pub use service::GenerationService;

/// The remote generate-content call. `GeminiClient` is the production implementation.
#[async_trait]
pub trait ContentGateway: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| RelayError::Config("GEMINI_API_KEY is required".into()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn send_once(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::from_transport(e, self.config.timeout))?;

        let body = check_response(response, self.config.timeout).await?;
        serde_json::from_value(body)
            .map_err(|e| RelayError::api(500, format!("Malformed Gemini response: {}", e)))
    }

    async fn send_with_retry(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let mut attempt = 0;
        loop {
            match self.send_once(model, request).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.retry_backoff, attempt);
                    attempt += 1;
                    log::warn!(
                        "Gemini call failed ({}), retry {}/{} in {}ms",
                        e,
                        attempt,
                        self.config.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Sends a trivial prompt to check that the key is accepted.
    pub async fn validate_api_key(&self) -> bool {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: Some(vec![Part::text("Hello")]),
            }],
            safety_settings: Vec::new(),
            generation_config: None,
        };

        match self
            .generate_content(&self.config.validation_model, &request)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::error!("Invalid API key or API error: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ContentGateway for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::info!("Invoking Gemini model: {}", model);

        let deadline = self.config.deadline;
        match tokio::time::timeout(deadline, self.send_with_retry(model, request)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout(deadline.as_millis() as u64)),
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(6))
}
