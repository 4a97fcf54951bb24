//! Mistral chat-completions client for vision models.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use snapattr_core::{Message, ProviderConfig, Usage, VlmRequest, VlmResponse};

use crate::{Provider, ProviderError};

const API_URL: &str = "https://api.mistral.ai/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "pixtral-12b-latest";

const SUPPORTED_MODELS: &[&str] = &[
    "pixtral-12b-latest",
    "pixtral-large-latest",
    "mistral-medium-latest",
    "mistral-small-latest",
];

/// Published per-1K-token rates, used for bookkeeping only.
fn cost_per_1k_tokens(model: &str) -> f64 {
    match model {
        "pixtral-12b-latest" => 0.0003,
        "pixtral-large-latest" => 0.0006,
        "mistral-medium-latest" => 0.0004,
        "mistral-small-latest" => 0.0002,
        _ => 0.0003,
    }
}

#[derive(Debug)]
pub struct MistralProvider {
    client: reqwest::Client,
    api_key: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl MistralProvider {
    /// Create a client, validating any model pinned in the config.
    pub fn new(api_key: String, config: &ProviderConfig) -> Result<Self, ProviderError> {
        if let Some(model) = &config.model {
            validate_model(model)?;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }
}

fn validate_model(model: &str) -> Result<(), ProviderError> {
    if SUPPORTED_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(ProviderError::UnsupportedModel {
            provider: "mistral",
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Provider for MistralProvider {
    fn name(&self) -> &'static str {
        "mistral"
    }

    fn available_models(&self) -> &'static [&'static str] {
        SUPPORTED_MODELS
    }

    async fn predict(&self, request: &VlmRequest) -> Result<VlmResponse, ProviderError> {
        validate_model(&request.model)?;

        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let start = Instant::now();
        let resp = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Http(err)
                }
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)?;

        let cost_usd =
            (parsed.usage.total_tokens as f64 / 1000.0) * cost_per_1k_tokens(&request.model);
        info!(
            model = %request.model,
            total_tokens = parsed.usage.total_tokens,
            latency_ms,
            "mistral completion"
        );

        Ok(VlmResponse {
            content,
            usage: Usage {
                prompt_tokens: parsed.usage.prompt_tokens,
                completion_tokens: parsed.usage.completion_tokens,
                total_tokens: parsed.usage.total_tokens,
                cost_usd,
            },
            latency_ms,
            provider: "mistral".to_string(),
            model: request.model.clone(),
            timestamp: Utc::now(),
        })
    }

    /// Pre-flight estimate: max completion tokens plus prompt overhead.
    fn estimate_cost(&self, request: &VlmRequest) -> f64 {
        let estimated_tokens = u64::from(request.max_tokens) + 100;
        (estimated_tokens as f64 / 1000.0) * cost_per_1k_tokens(&request.model)
    }
}
