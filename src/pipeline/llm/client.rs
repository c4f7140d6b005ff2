use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::PipelineArgs;
use crate::error::{CommandResult, EnricherError};
use crate::pipeline::llm::LlmProvider;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Exponential backoff with additive jitter. `max` caps the total delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
    pub status_codes: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_args(args: &PipelineArgs) -> Self {
        Self {
            retries: args.retries,
            base: secs(args.retry_backoff_base_secs),
            max: secs(args.retry_backoff_max_secs),
            jitter: secs(args.retry_jitter_secs),
            status_codes: args.retry_status_codes.clone(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2f64.powi(retry.saturating_sub(1).min(31) as i32);
        self.base.mul_f64(factor).min(self.max)
    }

    fn delay(&self, retry: u32) -> Duration {
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rand::rng().random_range(0.0..=1.0))
        };
        (self.backoff(retry) + jitter).min(self.max)
    }

    fn retries_status(&self, status: StatusCode) -> bool {
        self.status_codes.contains(&status.as_u16())
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

/// Client for the Ollama `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> CommandResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| EnricherError::Llm(format!("failed to build HTTP client: {err}")))?;

        let client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            retry,
        };
        tracing::info!(endpoint = %client.endpoint(), model = %client.model, "LLM client initialized");
        Ok(client)
    }

    pub fn from_args(args: &PipelineArgs) -> CommandResult<Self> {
        Self::new(
            &args.llm_url,
            &args.model_name,
            args.timeout(),
            RetryPolicy::from_args(args),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    async fn attempt(&self, prompt: &str) -> Result<Value, AttemptError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() || err.is_connect() {
                    AttemptError::Retryable(err.to_string())
                } else {
                    AttemptError::Fatal(err.to_string())
                }
            })?;

        let status = response.status();
        if self.retry.retries_status(status) {
            return Err(AttemptError::Retryable(format!(
                "retryable HTTP status: {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(format!("HTTP status {}", status.as_u16())));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| AttemptError::Retryable(format!("invalid response body: {err}")))?;
        if body.response.trim().is_empty() {
            return Err(AttemptError::Retryable("LLM returned empty response".into()));
        }

        serde_json::from_str(&body.response)
            .map_err(|err| AttemptError::Retryable(format!("LLM answer is not valid JSON: {err}")))
    }
}

impl LlmProvider for OllamaClient {
    async fn generate(&self, prompt: &str) -> CommandResult<Value> {
        let attempts = self.retry.max_attempts();
        let mut attempt = 1;
        loop {
            match self.attempt(prompt).await {
                Ok(value) => {
                    tracing::debug!(attempt, "LLM response parsed");
                    return Ok(value);
                }
                Err(AttemptError::Retryable(reason)) if attempt < attempts => {
                    tracing::warn!(attempt, %reason, "LLM request failed, retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(reason)) | Err(AttemptError::Fatal(reason)) => {
                    return Err(EnricherError::Llm(reason));
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let result = self
            .http
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                tracing::info!("LLM service health check: OK");
                true
            }
            Err(error) => {
                tracing::error!(%url, %error, "LLM service health check failed");
                false
            }
        }
    }
}
