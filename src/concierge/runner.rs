//! Runs concierge turns against per-session history and state.

use super::agent::{AGENT_NAME, PurchasingAgent, SendTaskTool};
use super::session::{INPUT_MESSAGE_METADATA, SessionStore};
use crate::a2a::types::Metadata;
use crate::brain::provider::{Message, Provider};
use crate::brain::{AgentError, AgentLoop, ToolExecutionContext, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
    /// The reply is a seller's question relayed verbatim.
    pub escalated: bool,
    pub active_agent: Option<String>,
}

pub struct Concierge {
    agent: Arc<PurchasingAgent>,
    runner: AgentLoop,
    sessions: SessionStore,
}

impl Concierge {
    pub fn new(agent: Arc<PurchasingAgent>, provider: Arc<dyn Provider>, max_iterations: usize) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(SendTaskTool::new(agent.clone())));
        Self {
            agent,
            runner: AgentLoop::new(AGENT_NAME, provider, tools).with_max_iterations(max_iterations),
            sessions: SessionStore::new(),
        }
    }

    pub fn agent(&self) -> &PurchasingAgent {
        &self.agent
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `message` in the given session, creating it if needed. Turns of
    /// one session run one at a time.
    pub async fn run_turn(
        &self,
        session_id: Option<&str>,
        message: &str,
        metadata: Option<Metadata>,
    ) -> Result<ChatReply, AgentError> {
        let session = self.sessions.get_or_create(session_id).await;
        let mut session = session.lock().await;

        match metadata {
            Some(metadata) => session
                .state
                .set(INPUT_MESSAGE_METADATA, serde_json::to_value(metadata).unwrap_or_default()),
            None => {
                session.state.remove(INPUT_MESSAGE_METADATA);
            }
        }

        let mark = session.history.len();
        let mut history = std::mem::take(&mut session.history);
        history.push(Message::user(message));
        let mut context =
            ToolExecutionContext::new(session.id.clone(), std::mem::take(&mut session.state));

        let outcome = self.runner.run(self.agent.as_ref(), &mut history, &mut context).await;

        session.state = context.state;
        session.updated_at = chrono::Utc::now();
        let outcome = match outcome {
            Ok(outcome) => {
                session.history = history;
                outcome
            }
            Err(e) => {
                history.truncate(mark);
                session.history = history;
                tracing::error!("Session {} turn failed: {}", session.id, e);
                return Err(e);
            }
        };

        tracing::debug!(
            "Session {} turn used {} input / {} output tokens",
            session.id,
            outcome.usage.input_tokens,
            outcome.usage.output_tokens
        );
        Ok(ChatReply {
            session_id: session.id.clone(),
            reply: outcome.text,
            escalated: outcome.escalated,
            active_agent: session.active_agent().map(str::to_string),
        })
    }
}
