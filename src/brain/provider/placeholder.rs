//! Placeholder Provider
//!
//! A stub provider used when no model credentials are configured.
//! Lets the services start and report the problem on every agent call.

use async_trait::async_trait;

use super::{LLMRequest, LLMResponse, Provider, ProviderError, Result};

/// A placeholder provider that returns an error when used.
pub struct PlaceholderProvider;

#[async_trait]
impl Provider for PlaceholderProvider {
    fn name(&self) -> &str {
        "none"
    }

    fn default_model(&self) -> &str {
        "none"
    }

    fn calculate_cost(&self, _model: &str, _input_tokens: u32, _output_tokens: u32) -> f64 {
        0.0
    }

    async fn complete(&self, _request: LLMRequest) -> Result<LLMResponse> {
        Err(ProviderError::Internal(
            "No model credentials configured. Set GOOGLE_API_KEY, or GOOGLE_GENAI_USE_VERTEXAI \
             with GOOGLE_CLOUD_PROJECT and GOOGLE_CLOUD_ACCESS_TOKEN."
                .to_string(),
        ))
    }
}
