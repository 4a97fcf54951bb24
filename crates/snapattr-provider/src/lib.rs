//! VLM provider clients and prompt construction.
//!
//! A [`Provider`] turns a [`VlmRequest`] into a raw [`VlmResponse`];
//! the [`PromptBuilder`] assembles the request from an item, a schema,
//! and a prompt template. Credentials come from the environment, never
//! from config files.

pub mod mistral;
pub mod prompt;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use snapattr_core::{ProviderConfig, VlmRequest, VlmResponse};

pub use mistral::MistralProvider;
pub use prompt::PromptBuilder;

/// Environment variable holding the Mistral API key.
pub const MISTRAL_API_KEY_VAR: &str = "MISTRAL_API_KEY";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnsupportedProvider(String),

    #[error("unsupported model {model} for provider {provider}")]
    UnsupportedModel {
        provider: &'static str,
        model: String,
    },

    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("failed to read prompt template {path}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response contained no choices")]
    EmptyResponse,
}

/// A vision-language model backend.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Model identifiers this backend accepts.
    fn available_models(&self) -> &'static [&'static str];

    /// Send one request and return the raw response.
    async fn predict(&self, request: &VlmRequest) -> Result<VlmResponse, ProviderError>;

    /// Rough pre-flight cost estimate in USD.
    fn estimate_cost(&self, request: &VlmRequest) -> f64;
}

/// Instantiate a provider by config name.
pub fn create_provider(
    name: &str,
    config: &ProviderConfig,
) -> Result<Box<dyn Provider>, ProviderError> {
    match name {
        "mistral" => {
            let api_key = std::env::var(MISTRAL_API_KEY_VAR)
                .map_err(|_| ProviderError::MissingApiKey(MISTRAL_API_KEY_VAR))?;
            Ok(Box::new(MistralProvider::new(api_key, config)?))
        }
        other => Err(ProviderError::UnsupportedProvider(other.to_string())),
    }
}
