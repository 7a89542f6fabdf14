//! Model ↔ tool loop shared by the sellers and the concierge.
//!
//! One call to [`AgentLoop::run`] is one user turn: the model is asked for a
//! reply, any function calls it makes are executed and fed back, and the loop
//! repeats until the model answers in plain text, a tool escalates, or the
//! iteration budget runs out.

use crate::brain::State;
use crate::brain::provider::{
    ContentBlock, LLMRequest, Message, Provider, ProviderError, Role, TokenUsage,
};
use crate::brain::tools::{ToolExecutionContext, ToolRegistry, ToolResult};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Per-agent callbacks around each model call.
pub trait AgentHooks: Send + Sync {
    /// System instruction for the next model call.
    fn instruction(&self, state: &State) -> String;

    /// Runs before every model call and may update the state.
    fn before_model(&self, _state: &mut State) {}
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Agent stopped after {0} model calls without a final answer")]
    MaxIterations(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    pub text: String,
    /// A tool ended the turn; `text` is that tool's output.
    pub escalated: bool,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct AgentLoop {
    name: String,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(name: impl Into<String>, provider: Arc<dyn Provider>, tools: ToolRegistry) -> Self {
        Self {
            name: name.into(),
            provider,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one turn. `history` must already end with the user message and
    /// receives every model and tool message produced.
    pub async fn run(
        &self,
        hooks: &dyn AgentHooks,
        history: &mut Vec<Message>,
        context: &mut ToolExecutionContext,
    ) -> Result<TurnOutcome, AgentError> {
        let mut usage = TokenUsage::default();
        context.escalate = false;

        for iteration in 1..=self.max_iterations {
            hooks.before_model(&mut context.state);

            let request = LLMRequest::new(self.provider.default_model(), history.clone())
                .with_system(hooks.instruction(&context.state))
                .with_tools(self.tools.definitions());

            let response = self.provider.complete(request).await?;
            usage += response.usage;
            self.log_usage(&response.model, response.usage);

            let calls: Vec<(String, String, Value)> = response
                .tool_uses()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if calls.is_empty() {
                let text = response.text();
                if !response.content.is_empty() {
                    history.push(Message {
                        role: Role::Assistant,
                        content: response.content,
                    });
                }
                return Ok(TurnOutcome {
                    text,
                    escalated: false,
                    usage,
                });
            }

            history.push(Message {
                role: Role::Assistant,
                content: response.content,
            });

            let mut results = Vec::with_capacity(calls.len());
            let mut escalation: Option<ToolResult> = None;
            for (id, name, input) in calls {
                tracing::info!(
                    "[{}] iteration {}: calling tool {} with {}",
                    self.name,
                    iteration,
                    name,
                    crate::utils::truncate_str(&input.to_string(), 300)
                );
                let result = match self.tools.execute(&name, input, context).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("[{}] tool {} failed: {}", self.name, name, e);
                        ToolResult::error(e.to_string())
                    }
                };
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    name,
                    content: result.to_content(),
                    is_error: !result.success,
                });
                if context.escalate && escalation.is_none() {
                    escalation = Some(result);
                }
            }

            history.push(Message {
                role: Role::User,
                content: results,
            });

            if let Some(result) = escalation {
                tracing::info!("[{}] tool escalated, ending turn", self.name);
                let text = result.to_text();
                // Keep user/model turns alternating for the next turn.
                history.push(Message::assistant(text.clone()));
                return Ok(TurnOutcome {
                    text,
                    escalated: true,
                    usage,
                });
            }
        }

        Err(AgentError::MaxIterations(self.max_iterations))
    }

    /// Ask the model, without tools, to answer `history` as JSON matching
    /// `schema`. Returns the raw JSON text.
    pub async fn structured(
        &self,
        system: &str,
        history: &[Message],
        schema: Value,
    ) -> Result<(String, TokenUsage), AgentError> {
        let mut request =
            LLMRequest::new(self.provider.default_model(), history.to_vec()).with_system(system);
        request.temperature = Some(0.0);
        request.response_schema = Some(schema);

        let response = self.provider.complete(request).await?;
        self.log_usage(&response.model, response.usage);
        Ok((response.text(), response.usage))
    }

    fn log_usage(&self, model: &str, usage: TokenUsage) {
        let cost = self
            .provider
            .calculate_cost(model, usage.input_tokens, usage.output_tokens);
        tracing::debug!(
            "[{}] {} tokens in, {} out (~${:.6})",
            self.name,
            usage.input_tokens,
            usage.output_tokens,
            cost
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::tools::{Result as ToolResultT, Tool};
    use crate::test_helpers::ScriptedProvider;
    use async_trait::async_trait;
    use serde_json::json;

    struct Hooks;

    impl AgentHooks for Hooks {
        fn instruction(&self, state: &State) -> String {
            format!("turns={}", state.get("turns").cloned().unwrap_or(json!(0)))
        }

        fn before_model(&self, state: &mut State) {
            let turns = state.get("turns").and_then(Value::as_i64).unwrap_or(0);
            state.set("turns", turns + 1);
        }
    }

    /// Echoes its input; escalates when asked to.
    struct Ask;

    #[async_trait]
    impl Tool for Ask {
        fn name(&self) -> &str {
            "ask"
        }

        fn description(&self) -> &str {
            "Ask something"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            input: Value,
            context: &mut ToolExecutionContext,
        ) -> ToolResultT<ToolResult> {
            if input["escalate"].as_bool().unwrap_or(false) {
                context.escalate = true;
            }
            Ok(ToolResult::success(json!([input["q"].clone()])))
        }
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Ask));
        AgentLoop::new("test", provider, tools)
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("hello")]));
        let mut history = vec![Message::user("hi")];
        let mut ctx = ToolExecutionContext::default();

        let outcome = agent(provider.clone())
            .run(&Hooks, &mut history, &mut ctx)
            .await
            .expect("runs");

        assert_eq!(outcome.text, "hello");
        assert!(!outcome.escalated);
        assert_eq!(history.len(), 2);
        assert_eq!(provider.requests()[0].system.as_deref(), Some("turns=1"));
        assert_eq!(provider.requests()[0].tools[0].name, "ask");
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("ask", json!({"q": "size?"})),
            ScriptedProvider::text("done"),
        ]));
        let mut history = vec![Message::user("order")];
        let mut ctx = ToolExecutionContext::default();

        let outcome = agent(provider.clone())
            .run(&Hooks, &mut history, &mut ctx)
            .await
            .expect("runs");

        assert_eq!(outcome.text, "done");
        // user, model call, tool result, final answer
        assert_eq!(history.len(), 4);
        assert!(matches!(
            &history[2].content[0],
            ContentBlock::ToolResult { content, .. } if content == &json!(["size?"])
        ));
        assert_eq!(ctx.state.get("turns"), Some(&json!(2)));
        assert_eq!(provider.requests()[1].system.as_deref(), Some("turns=2"));
    }

    #[tokio::test]
    async fn test_escalation_ends_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::tool_call(
            "ask",
            json!({"q": "Which pizza?", "escalate": true}),
        )]));
        let mut history = vec![Message::user("pizza")];
        let mut ctx = ToolExecutionContext::default();

        let outcome = agent(provider.clone())
            .run(&Hooks, &mut history, &mut ctx)
            .await
            .expect("runs");

        assert!(outcome.escalated);
        assert_eq!(outcome.text, "Which pizza?");
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(history.last().map(|m| m.role), Some(Role::Assistant));
        assert_eq!(history.last().map(Message::text).as_deref(), Some("Which pizza?"));
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("nope", json!({})),
            ScriptedProvider::text("sorry"),
        ]));
        let mut history = vec![Message::user("x")];
        let mut ctx = ToolExecutionContext::default();

        let outcome = agent(provider)
            .run(&Hooks, &mut history, &mut ctx)
            .await
            .expect("runs");

        assert_eq!(outcome.text, "sorry");
        assert!(matches!(
            &history[2].content[0],
            ContentBlock::ToolResult { is_error: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call("ask", json!({"q": "a"})),
            ScriptedProvider::tool_call("ask", json!({"q": "b"})),
        ]));
        let mut history = vec![Message::user("x")];
        let mut ctx = ToolExecutionContext::default();

        let err = agent(provider)
            .with_max_iterations(2)
            .run(&Hooks, &mut history, &mut ctx)
            .await
            .expect_err("budget exhausted");
        assert!(matches!(err, AgentError::MaxIterations(2)));
    }

    #[tokio::test]
    async fn test_structured_sets_schema() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text(
            r#"{"status":"completed","message":"ok"}"#,
        )]));
        let (json, _) = agent(provider.clone())
            .structured("format", &[Message::user("x")], json!({"type": "object"}))
            .await
            .expect("structured");

        assert!(json.contains("completed"));
        let request = &provider.requests()[0];
        assert!(request.tools.is_empty());
        assert_eq!(request.response_schema, Some(json!({"type": "object"})));
    }
}
