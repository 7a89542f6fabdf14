//! The LLM-backed seller: menu questions, confirmation, order creation.

use super::order::{CreateOrderTool, OrderBook};
use super::profile::{RESPONSE_FORMAT_INSTRUCTION, SellerKind};
use crate::brain::provider::{Message, Provider};
use crate::brain::{AgentError, AgentHooks, AgentLoop, State, ToolExecutionContext, ToolRegistry};
use serde::Deserialize;
use serde_json::{Value, json};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Idle time after which a remembered conversation may be dropped.
pub const MEMORY_TTL_SECS: i64 = 24 * 60 * 60;
pub const MEMORY_MAX_SESSIONS: usize = 10_000;

pub const UNABLE_TO_PROCESS: &str =
    "We are unable to process your request at the moment. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    InputRequired,
    Completed,
    Error,
}

/// Structured final answer the model is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseFormat {
    #[serde(default)]
    pub status: ResponseStatus,
    pub message: String,
}

impl ResponseFormat {
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["input_required", "completed", "error"]
                },
                "message": {"type": "string"}
            },
            "required": ["status", "message"]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub is_task_complete: bool,
    pub require_user_input: bool,
    pub content: String,
}

impl AgentResponse {
    /// Map the model's JSON answer; anything unreadable asks the caller to retry.
    pub fn from_structured(raw: &str) -> Self {
        match parse_response_format(raw) {
            Some(ResponseFormat {
                status: ResponseStatus::Completed,
                message,
            }) => Self {
                is_task_complete: true,
                require_user_input: false,
                content: message,
            },
            Some(ResponseFormat { message, .. }) => Self {
                is_task_complete: false,
                require_user_input: true,
                content: message,
            },
            None => {
                tracing::warn!(
                    "Unparseable structured response: {}",
                    crate::utils::truncate_str(raw, 200)
                );
                Self {
                    is_task_complete: false,
                    require_user_input: true,
                    content: UNABLE_TO_PROCESS.to_string(),
                }
            }
        }
    }
}

fn parse_response_format(raw: &str) -> Option<ResponseFormat> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).ok()
}

struct SellerHooks {
    instruction: String,
}

impl AgentHooks for SellerHooks {
    fn instruction(&self, _state: &State) -> String {
        self.instruction.clone()
    }
}

/// One remembered conversation. The mutex is held for a whole `invoke`, so
/// concurrent requests on one session are answered in turn.
struct Conversation {
    history: Vec<Message>,
    updated_at: DateTime<Utc>,
}

/// Per-session conversations for sellers that keep memory.
struct ConversationMemory {
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl ConversationMemory {
    fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<Conversation>> {
        if let Some(conversation) = self.conversations.read().await.get(session_id) {
            return conversation.clone();
        }
        let mut conversations = self.conversations.write().await;
        if let Some(conversation) = conversations.get(session_id) {
            return conversation.clone();
        }
        self.prune(&mut conversations);
        let conversation = Arc::new(Mutex::new(Conversation {
            history: Vec::new(),
            updated_at: Utc::now(),
        }));
        conversations.insert(session_id.to_string(), conversation.clone());
        conversation
    }

    /// Expired first, then oldest, until one more fits. Busy ones stay.
    fn prune(&self, conversations: &mut HashMap<String, Arc<Mutex<Conversation>>>) {
        let cutoff = Utc::now() - self.idle_ttl;
        let mut idle: Vec<(DateTime<Utc>, String)> = conversations
            .iter()
            .filter_map(|(id, c)| Some((c.try_lock().ok()?.updated_at, id.clone())))
            .collect();
        idle.sort();
        for (updated_at, id) in idle {
            if updated_at >= cutoff && conversations.len() < self.max_sessions {
                break;
            }
            conversations.remove(&id);
        }
    }

    async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }
}

pub struct SellerAgent {
    kind: SellerKind,
    agent: AgentLoop,
    orders: OrderBook,
    memory: ConversationMemory,
}

impl SellerAgent {
    pub fn new(kind: SellerKind, provider: Arc<dyn Provider>) -> Self {
        let orders = OrderBook::new();
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CreateOrderTool::new(
            kind.tool_name(),
            kind.product(),
            orders.clone(),
        )));

        Self {
            kind,
            agent: AgentLoop::new(kind.agent_name(), provider, tools),
            orders,
            memory: ConversationMemory::new(
                Duration::seconds(MEMORY_TTL_SECS),
                MEMORY_MAX_SESSIONS,
            ),
        }
    }

    /// Bound the remembered conversations by idle time and count.
    pub fn with_memory_limits(mut self, idle_ttl: Duration, max_sessions: usize) -> Self {
        self.memory = ConversationMemory::new(idle_ttl, max_sessions);
        self
    }

    pub fn kind(&self) -> SellerKind {
        self.kind
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    /// Answer `query` within `session_id`.
    pub async fn invoke(&self, query: &str, session_id: &str) -> Result<AgentResponse, AgentError> {
        if !self.kind.keeps_memory() {
            return self.respond(query, session_id, Vec::new()).await.map(|(r, _)| r);
        }

        let conversation = self.memory.get_or_create(session_id).await;
        let mut conversation = conversation.lock().await;
        let (response, history) = self
            .respond(query, session_id, conversation.history.clone())
            .await?;
        conversation.history = history;
        conversation.updated_at = Utc::now();
        Ok(response)
    }

    async fn respond(
        &self,
        query: &str,
        session_id: &str,
        mut history: Vec<Message>,
    ) -> Result<(AgentResponse, Vec<Message>), AgentError> {
        history.push(Message::user(query));

        let hooks = SellerHooks {
            instruction: self.kind.instruction(query, session_id),
        };
        let mut context = ToolExecutionContext::new(session_id, State::new());
        let outcome = self.agent.run(&hooks, &mut history, &mut context).await?;
        tracing::debug!(
            "[{}] session {} answered: {}",
            self.agent.name(),
            session_id,
            crate::utils::truncate_str(&outcome.text, 200)
        );

        let mut format_request = history.clone();
        format_request.push(Message::user(
            "Respond with the JSON object for your last reply.",
        ));
        let (raw, _) = self
            .agent
            .structured(
                RESPONSE_FORMAT_INSTRUCTION,
                &format_request,
                ResponseFormat::schema(),
            )
            .await?;

        Ok((AgentResponse::from_structured(&raw), history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"status":"completed","message":"Order placed"}"#, true, false, "Order placed")]
    #[case(r#"{"status":"input_required","message":"Confirm?"}"#, false, true, "Confirm?")]
    #[case(r#"{"status":"error","message":"Oops"}"#, false, true, "Oops")]
    #[case(r#"{"message":"Which burger?"}"#, false, true, "Which burger?")]
    #[case("```json\n{\"status\":\"completed\",\"message\":\"Done\"}\n```", true, false, "Done")]
    #[case("not json", false, true, UNABLE_TO_PROCESS)]
    #[case(r#"{"status":"shipped","message":"?"}"#, false, true, UNABLE_TO_PROCESS)]
    fn test_from_structured(
        #[case] raw: &str,
        #[case] complete: bool,
        #[case] input: bool,
        #[case] content: &str,
    ) {
        let response = AgentResponse::from_structured(raw);
        assert_eq!(response.is_task_complete, complete);
        assert_eq!(response.require_user_input, input);
        assert_eq!(response.content, content);
    }

    #[tokio::test]
    async fn test_burger_creates_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::tool_call(
                "create_burger_order",
                json!({"order_items": [{"name": "Classic Cheeseburger", "quantity": 1, "price": 85}]}),
            ),
            ScriptedProvider::text("Your order is placed."),
            ScriptedProvider::text(r#"{"status":"completed","message":"Your order is placed."}"#),
        ]));
        let agent = SellerAgent::new(SellerKind::Burger, provider.clone());

        let response = agent
            .invoke("1 classic cheeseburger, confirmed", "s1")
            .await
            .expect("invoke");

        assert!(response.is_task_complete);
        assert_eq!(agent.orders().len().await, 1);
        let requests = provider.requests();
        assert!(
            requests[0]
                .system
                .as_deref()
                .unwrap_or_default()
                .contains("Received user query: 1 classic cheeseburger, confirmed")
        );
        assert!(requests[2].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_pizza_remembers_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text("Which pizza?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which pizza?"}"#),
            ScriptedProvider::text("Pepperoni, total 140K. Confirm?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Confirm?"}"#),
        ]));
        let agent = SellerAgent::new(SellerKind::Pizza, provider.clone());

        agent.invoke("I want pizza", "s1").await.expect("first");
        agent.invoke("pepperoni", "s1").await.expect("second");

        let second_turn = &provider.requests()[2];
        // user, model, user
        assert_eq!(second_turn.messages.len(), 3);
        assert_eq!(second_turn.messages[0].text(), "I want pizza");
    }

    #[tokio::test]
    async fn test_pizza_concurrent_turns_keep_both() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text("Which pizza?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which pizza?"}"#),
            ScriptedProvider::text("Which size?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which size?"}"#),
            ScriptedProvider::text("Confirm?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Confirm?"}"#),
        ]));
        let agent = SellerAgent::new(SellerKind::Pizza, provider.clone());

        let (first, second) = tokio::join!(
            agent.invoke("I want pizza", "s1"),
            agent.invoke("a large one", "s1")
        );
        first.expect("first");
        second.expect("second");
        agent.invoke("pepperoni", "s1").await.expect("third");

        // two earlier user/model pairs plus the new query
        assert_eq!(provider.requests()[4].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_pizza_memory_is_bounded() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text("Which pizza?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which pizza?"}"#),
            ScriptedProvider::text("Which pizza?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which pizza?"}"#),
            ScriptedProvider::text("Which pizza?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which pizza?"}"#),
        ]));
        let agent = SellerAgent::new(SellerKind::Pizza, provider.clone())
            .with_memory_limits(Duration::hours(1), 1);

        agent.invoke("hi", "s1").await.expect("s1");
        agent.invoke("hi", "s2").await.expect("s2");
        assert_eq!(agent.memory.len().await, 1);

        agent.invoke("hi again", "s1").await.expect("s1 again");
        assert_eq!(provider.requests()[4].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_burger_forgets_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::text("Which burger?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Which burger?"}"#),
            ScriptedProvider::text("Classic, 85K. Confirm?"),
            ScriptedProvider::text(r#"{"status":"input_required","message":"Confirm?"}"#),
        ]));
        let agent = SellerAgent::new(SellerKind::Burger, provider.clone());

        agent.invoke("I want a burger", "s1").await.expect("first");
        agent.invoke("classic", "s1").await.expect("second");

        assert_eq!(provider.requests()[2].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = SellerAgent::new(SellerKind::Pizza, provider);
        assert!(agent.invoke("hi", "s1").await.is_err());
    }
}
