//! Tool trait and execution types.

use super::error::Result;
use crate::brain::State;
use async_trait::async_trait;
use serde_json::{Value, json};

/// A function the model can call during an agent turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the tool input.
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, context: &mut ToolExecutionContext) -> Result<ToolResult>;
}

/// Mutable context handed to tools for the duration of one turn.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    pub session_id: String,
    pub state: State,
    /// Set by a tool to end the turn right after it returns; its output
    /// becomes the turn's answer.
    pub escalate: bool,
}

impl ToolExecutionContext {
    pub fn new(session_id: impl Into<String>, state: State) -> Self {
        Self {
            session_id: session_id.into(),
            state,
            escalate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Payload reported back to the model.
    pub fn to_content(&self) -> Value {
        match &self.error {
            Some(message) if !self.success => json!({ "error": message }),
            _ => self.output.clone(),
        }
    }

    /// Plain text rendering; string arrays become one line per entry.
    pub fn to_text(&self) -> String {
        if let Some(message) = self.error.as_ref().filter(|_| !self.success) {
            return message.clone();
        }
        match &self.output {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text() {
        assert_eq!(ToolResult::success("done").to_text(), "done");
        assert_eq!(
            ToolResult::success(json!(["Which size?", "Unknown type: file"])).to_text(),
            "Which size?\nUnknown type: file"
        );
        assert_eq!(ToolResult::error("Agent x not found").to_text(), "Agent x not found");
    }

    #[test]
    fn test_to_content() {
        assert_eq!(
            ToolResult::error("boom").to_content(),
            json!({"error": "boom"})
        );
        assert_eq!(ToolResult::success(json!({"a": 1})).to_content(), json!({"a": 1}));
    }
}
