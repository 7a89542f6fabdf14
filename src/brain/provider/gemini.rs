//! Gemini `generateContent` provider.
//!
//! Talks to either Google AI Studio (API key) or Vertex AI (project,
//! location and OAuth access token). Only the non-streaming call is used.

use super::{
    ContentBlock, LLMRequest, LLMResponse, Message, Provider, ProviderError, Result, Role,
    StopReason, TokenUsage, ToolDefinition,
};
use crate::config::ModelConfig;
use crate::utils::{RetryConfig, retry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;

const STUDIO_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub enum GeminiBackend {
    Studio {
        api_key: String,
    },
    Vertex {
        project: String,
        location: String,
        access_token: String,
    },
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Studio { .. } => f.write_str("Studio { api_key: <redacted> }"),
            Self::Vertex {
                project, location, ..
            } => f
                .debug_struct("Vertex")
                .field("project", project)
                .field("location", location)
                .finish_non_exhaustive(),
        }
    }
}

pub struct GeminiProvider {
    http: reqwest::Client,
    backend: GeminiBackend,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl GeminiProvider {
    pub fn new(backend: GeminiBackend, model: String, config: &ModelConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| match &backend {
                GeminiBackend::Studio { .. } => STUDIO_BASE_URL.to_string(),
                GeminiBackend::Vertex { location, .. } if location == "global" => {
                    "https://aiplatform.googleapis.com".to_string()
                }
                GeminiBackend::Vertex { location, .. } => {
                    format!("https://{}-aiplatform.googleapis.com", location)
                }
            })
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            backend,
            base_url,
            model,
            retry: RetryConfig::default().with_max_attempts(config.max_retries + 1),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            GeminiBackend::Studio { .. } => "ai-studio",
            GeminiBackend::Vertex { .. } => "vertex-ai",
        }
    }

    fn endpoint(&self, model: &str) -> String {
        match &self.backend {
            GeminiBackend::Studio { .. } => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, model
            ),
            GeminiBackend::Vertex {
                project, location, ..
            } => format!(
                "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                self.base_url, project, location, model
            ),
        }
    }

    async fn send_once(&self, url: &str, body: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let request = self.http.post(url).json(body);
        let request = match &self.backend {
            GeminiBackend::Studio { api_key } => request.header("x-goog-api-key", api_key),
            GeminiBackend::Vertex { access_token, .. } => request.bearer_auth(access_token),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(api_error_message(&text)));
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };
        let url = self.endpoint(&model);
        let body = GenerateContentRequest::from_request(&request);

        tracing::debug!(
            "Gemini request: model={}, messages={}, tools={}",
            model,
            request.messages.len(),
            request.tools.len()
        );

        let response = retry(&self.retry, "Gemini generateContent", || {
            self.send_once(&url, &body)
        })
        .await?;

        response.into_llm_response(model)
    }
}

/// Pull `error.message` out of a Google API error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| crate::utils::truncate_str(body, 500))
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl GenerateContentRequest {
    fn from_request(request: &LLMRequest) -> Self {
        let contents = request.messages.iter().map(Content::from_message).collect();

        let system_instruction = request.system.as_ref().map(|s| Content {
            role: None,
            parts: vec![WirePart {
                text: Some(s.clone()),
                ..Default::default()
            }],
        });

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolSet {
                function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
            }]
        };

        let generation_config = if request.temperature.is_some() || request.response_schema.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request
                    .response_schema
                    .as_ref()
                    .map(|_| "application/json".to_string()),
                response_schema: request.response_schema.clone().map(to_gemini_schema),
            })
        } else {
            None
        };

        Self {
            contents,
            system_instruction,
            tools,
            generation_config,
        }
    }
}

impl Content {
    fn from_message(message: &Message) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        let parts = message
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => WirePart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                ContentBlock::ToolUse { name, input, .. } => WirePart {
                    function_call: Some(FunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    }),
                    ..Default::default()
                },
                ContentBlock::ToolResult { name, content, .. } => WirePart {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: match content {
                            Value::Object(_) => content.clone(),
                            other => json!({ "result": other }),
                        },
                    }),
                    ..Default::default()
                },
            })
            .collect();

        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

impl From<&ToolDefinition> for FunctionDeclaration {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: to_gemini_schema(tool.input_schema.clone()),
        }
    }
}

/// Rewrite a JSON schema into Gemini's OpenAPI subset: upper-case type
/// names, unsupported keywords dropped.
fn to_gemini_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "$schema" | "additionalProperties" | "default" | "title" => {}
                    "type" => {
                        let value = match value {
                            Value::String(s) => Value::String(s.to_uppercase()),
                            other => other,
                        };
                        out.insert(key, value);
                    }
                    "properties" => {
                        let value = match value {
                            Value::Object(props) => Value::Object(
                                props
                                    .into_iter()
                                    .map(|(name, prop)| (name, to_gemini_schema(prop)))
                                    .collect(),
                            ),
                            other => other,
                        };
                        out.insert(key, value);
                    }
                    _ => {
                        out.insert(key, to_gemini_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_gemini_schema).collect()),
        other => other,
    }
}

impl GenerateContentResponse {
    fn into_llm_response(self, requested_model: String) -> Result<LLMResponse> {
        let usage = self
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ProviderError::EmptyResponse(
                self.prompt_feedback.and_then(|f| f.block_reason),
            ));
        };

        let mut content = Vec::new();
        for part in candidate.content.unwrap_or_default().parts {
            if part.thought {
                continue;
            }
            if let Some(call) = part.function_call {
                content.push(ContentBlock::ToolUse {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: call.name,
                    input: call.args,
                });
            } else if let Some(text) = part.text {
                content.push(ContentBlock::Text { text });
            }
        }

        let has_tool_use = content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        let stop_reason = if has_tool_use {
            Some(StopReason::ToolUse)
        } else {
            candidate.finish_reason.as_deref().map(|r| match r {
                "STOP" => StopReason::EndTurn,
                "MAX_TOKENS" => StopReason::MaxTokens,
                "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
                    StopReason::Safety
                }
                _ => StopReason::Other,
            })
        };

        Ok(LLMResponse {
            model: self.model_version.unwrap_or(requested_model),
            content,
            stop_reason,
            usage,
        })
    }
}
