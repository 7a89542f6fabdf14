//! LLM Provider abstraction.
//!
//! The agents only ever need a single non-streaming completion call, so the
//! trait stays small. [`create_provider`] picks the backend from the model
//! configuration and falls back to [`PlaceholderProvider`] when no
//! credentials are available, so services still start and answer with a
//! descriptive error.

mod error;
mod gemini;
mod placeholder;
mod types;

pub use error::{ProviderError, Result};
pub use gemini::{GeminiBackend, GeminiProvider};
pub use placeholder::PlaceholderProvider;
pub use types::*;

use crate::config::ModelConfig;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider identifier used in logs.
    fn name(&self) -> &str;

    /// Model used when a request does not name one.
    fn default_model(&self) -> &str;

    /// Run one completion.
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;

    /// Estimated USD cost of a call.
    fn calculate_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        crate::pricing::pricing().calculate_cost(model, input_tokens, output_tokens)
    }
}

/// Build the provider described by `config`.
///
/// `default_model` applies when `config.model` is unset.
pub fn create_provider(config: &ModelConfig, default_model: &str) -> Arc<dyn Provider> {
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| default_model.to_string());

    let backend = if config.use_vertexai {
        match (&config.project, &config.access_token) {
            (Some(project), Some(token)) => Some(GeminiBackend::Vertex {
                project: project.clone(),
                location: config.location.clone(),
                access_token: token.clone(),
            }),
            (None, _) => {
                tracing::warn!("Vertex AI selected but GOOGLE_CLOUD_PROJECT is not set");
                None
            }
            (_, None) => {
                tracing::warn!("Vertex AI selected but GOOGLE_CLOUD_ACCESS_TOKEN is not set");
                None
            }
        }
    } else {
        match &config.api_key {
            Some(key) => Some(GeminiBackend::Studio {
                api_key: key.clone(),
            }),
            None => {
                tracing::warn!("GOOGLE_API_KEY is not set");
                None
            }
        }
    };

    match backend {
        Some(backend) => match GeminiProvider::new(backend, model, config) {
            Ok(provider) => {
                tracing::info!(
                    "Using Gemini provider ({}) with model {}",
                    provider.backend_name(),
                    provider.default_model()
                );
                Arc::new(provider)
            }
            Err(e) => {
                tracing::error!("Failed to create Gemini provider: {}", e);
                Arc::new(PlaceholderProvider)
            }
        },
        None => {
            tracing::warn!("No model credentials configured, agent calls will fail");
            Arc::new(PlaceholderProvider)
        }
    }
}
