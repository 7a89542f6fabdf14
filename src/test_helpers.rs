//! Shared fixtures for unit tests.

use crate::a2a::push::PushNotificationSender;
use crate::brain::provider::{
    ContentBlock, LLMRequest, LLMResponse, Provider, ProviderError, Result, StopReason,
    TokenUsage,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One RSA key per test binary; generating it is slow.
pub static PUSH_SENDER: Lazy<PushNotificationSender> =
    Lazy::new(|| PushNotificationSender::generate().expect("rsa key"));

/// Provider that replays canned responses and records every request.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<LLMResponse>>,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<LLMResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> LLMResponse {
        LLMResponse {
            model: "scripted".to_string(),
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: Some(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    pub fn tool_call(name: &str, input: Value) -> LLMResponse {
        LLMResponse {
            model: "scripted".to_string(),
            content: vec![ContentBlock::ToolUse {
                id: format!("call_{}", name),
                name: name.to_string(),
                input,
            }],
            stop_reason: Some(StopReason::ToolUse),
            usage: TokenUsage::default(),
        }
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        self.requests.lock().expect("requests lock").push(request);
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| ProviderError::Internal("script exhausted".to_string()))
    }
}
