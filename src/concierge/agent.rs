//! The purchasing agent: picks a seller and forwards the user's request as an
//! A2A task.

use super::connection::{RemoteAgentConnection, TaskCallback};
use super::session::{
    ACTIVE_AGENT, INPUT_MESSAGE_METADATA, NO_ACTIVE_AGENT, SESSION_ACTIVE, SESSION_ID, TASK_ID,
};
use crate::a2a::types::{Message, Metadata, Part, TaskSendParams, TaskState};
use crate::a2a::{A2aClient, A2aClientError, resolve_agent_card};
use crate::brain::tools::{Tool, ToolError, ToolExecutionContext, ToolResult};
use crate::brain::{AgentHooks, State};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const AGENT_NAME: &str = "purchasing_agent";
pub const DEFAULT_CONCIERGE_MODEL: &str = "gemini-2.0-flash-001";

const ACCEPTED_OUTPUT_MODES: &[&str] = &["text", "text/plain"];

#[derive(Debug, thiserror::Error)]
pub enum SendTaskError {
    #[error("Agent {0} not found")]
    AgentNotFound(String),

    #[error("Failed to send task to {agent}: {source}")]
    Client {
        agent: String,
        #[source]
        source: A2aClientError,
    },
}

/// Name and description of a reachable seller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteAgentInfo {
    pub name: String,
    pub description: Option<String>,
}

pub struct PurchasingAgent {
    /// In discovery order; names are unique.
    connections: Vec<RemoteAgentConnection>,
    callback: Option<TaskCallback>,
    /// One JSON object per line, embedded in the instruction.
    agents: String,
}

impl PurchasingAgent {
    pub fn new(connections: Vec<RemoteAgentConnection>, callback: Option<TaskCallback>) -> Self {
        let mut unique: Vec<RemoteAgentConnection> = Vec::with_capacity(connections.len());
        for connection in connections {
            match unique
                .iter_mut()
                .find(|c| c.card().name == connection.card().name)
            {
                Some(existing) => *existing = connection,
                None => unique.push(connection),
            }
        }

        let mut agent = Self {
            connections: unique,
            callback,
            agents: String::new(),
        };
        agent.agents = agent
            .list_remote_agents()
            .iter()
            .filter_map(|info| serde_json::to_string(info).ok())
            .collect::<Vec<_>>()
            .join("\n");
        agent
    }

    /// Resolve each address's agent card. Unreachable sellers are logged and
    /// skipped. `known_auth` maps card names to credentials.
    pub async fn connect(
        http: &reqwest::Client,
        addresses: &[String],
        known_auth: &HashMap<String, String>,
        callback: Option<TaskCallback>,
    ) -> Self {
        let cards = join_all(
            addresses
                .iter()
                .map(|address| resolve_agent_card(http, address)),
        )
        .await;

        let mut connections = Vec::with_capacity(addresses.len());
        for (address, card) in addresses.iter().zip(cards) {
            match card {
                Ok(card) => {
                    tracing::info!("Found agent card {} at {}", card.name, address);
                    let credential = known_auth.get(&card.name).map(String::as_str);
                    if credential.is_none() {
                        tracing::warn!("No credential configured for {}", card.name);
                    }
                    // Requests go to the configured address; cards advertise their bind address.
                    let client = A2aClient::new(http.clone(), card, credential, address.clone());
                    connections.push(RemoteAgentConnection::new(client));
                }
                Err(e) => {
                    tracing::error!("Failed to get agent card from {}: {}", address, e);
                }
            }
        }
        Self::new(connections, callback)
    }

    pub fn list_remote_agents(&self) -> Vec<RemoteAgentInfo> {
        self.connections
            .iter()
            .map(|c| RemoteAgentInfo {
                name: c.card().name.clone(),
                description: c.card().description.clone(),
            })
            .collect()
    }

    fn connection(&self, name: &str) -> Option<&RemoteAgentConnection> {
        self.connections.iter().find(|c| c.card().name == name)
    }

    /// Seller named in the prompt as currently active.
    pub fn check_active_agent(state: &State) -> String {
        if state.contains(SESSION_ID) && state.get_bool(SESSION_ACTIVE) {
            if let Some(agent) = state.get(ACTIVE_AGENT) {
                return match agent {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
            }
        }
        NO_ACTIVE_AGENT.to_string()
    }

    pub fn root_instruction(&self, state: &State) -> String {
        let current_agent = Self::check_active_agent(state);
        format!(
            "You are an expert purchasing delegator that can delegate the user product inquiry and purchase request to the
appropriate seller remote agents.

Execution:
- For actionable tasks, you can use `send_task` to assign tasks to remote agents to perform.
- When the remote agent is repeatedly asking for user confirmation, assume that the remote agent doesn't have access to user's conversation context.
    So improve the task description to include all the necessary information related to that agent
- Never ask user permission when you want to connect with remote agents. If you need to make connection with multiple remote agents, directly
    connect with them without asking user permission or asking user preference
- Always show the detailed response information from the seller agent and propagate it properly to the user.
- If the remote seller is asking for confirmation, rely the confirmation question to the user if the user haven't do so.
- If the user already confirmed the related order in the past conversation history, you can confirm on behalf of the user
- Do not give irrelevant context to remote seller agent. For example, ordered pizza item is not relevant for the burger seller agent
- Never ask order confirmation to the remote seller agent

Please rely on tools to address the request, and don't make up the response. If you are not sure, please ask the user for more details.
Focus on the most recent parts of the conversation primarily.

If there is an active agent, send the request to that agent with the update task tool.

Agents:
{agents}

Current active seller agent: {current_agent}
",
            agents = self.agents,
        )
    }

    /// Open a seller conversation when none is active.
    pub fn prepare_session(state: &mut State) {
        if !state.get_bool(SESSION_ACTIVE) {
            if !state.contains(SESSION_ID) {
                state.set(SESSION_ID, uuid::Uuid::new_v4().to_string());
            }
            state.set(SESSION_ACTIVE, true);
        }
    }

    /// Forward `task` to `agent_name` and return the seller's words, status
    /// message first, then artifacts.
    pub async fn send_task(
        &self,
        agent_name: &str,
        task: &str,
        context: &mut ToolExecutionContext,
    ) -> Result<Vec<String>, SendTaskError> {
        let connection = self
            .connection(agent_name)
            .ok_or_else(|| SendTaskError::AgentNotFound(agent_name.to_string()))?;
        let state = &mut context.state;

        let task_id =
            pending_task_id(state, agent_name).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        state.set(ACTIVE_AGENT, agent_name);

        let session_id = match state.get_str(SESSION_ID) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                state.set(SESSION_ID, id.clone());
                id
            }
        };

        let mut metadata: Metadata = state
            .get(INPUT_MESSAGE_METADATA)
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let message_id = metadata
            .get("message_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        metadata.insert("conversation_id".to_string(), session_id.clone().into());
        metadata.insert("message_id".to_string(), message_id.into());

        let mut message = Message::user_text(task);
        message.metadata = Some(metadata);
        let params = TaskSendParams {
            id: task_id,
            session_id: session_id.clone(),
            message,
            accepted_output_modes: Some(ACCEPTED_OUTPUT_MODES.iter().map(|m| m.to_string()).collect()),
            push_notification: None,
            history_length: None,
            metadata: Some(Metadata::from([(
                "conversation_id".to_string(),
                Value::from(session_id),
            )])),
        };

        tracing::info!("Sending task {} to {}", params.id, agent_name);
        let remote = connection
            .send_task(params, self.callback.as_ref())
            .await
            .map_err(|source| SendTaskError::Client {
                agent: agent_name.to_string(),
                source,
            })?;
        tracing::info!("{} answered task {} with {}", agent_name, remote.id, remote.status.state);

        let state = &mut context.state;
        let still_open = !remote.status.state.is_terminal();
        state.set(SESSION_ACTIVE, still_open);
        if still_open {
            state.set(TASK_ID, remote.id.clone());
        } else {
            state.remove(TASK_ID);
        }
        match remote.status.state {
            TaskState::InputRequired => context.escalate = true,
            TaskState::Completed => state.set(ACTIVE_AGENT, NO_ACTIVE_AGENT),
            _ => {}
        }

        let mut response = Vec::new();
        if let Some(message) = &remote.status.message {
            response.extend(convert_parts(&message.parts));
        }
        for artifact in remote.artifacts.iter().flatten() {
            response.extend(convert_parts(&artifact.parts));
        }
        Ok(response)
    }
}

impl AgentHooks for PurchasingAgent {
    fn instruction(&self, state: &State) -> String {
        self.root_instruction(state)
    }

    fn before_model(&self, state: &mut State) {
        Self::prepare_session(state);
    }
}

/// The open task to continue with `agent_name`. A pending task belongs to the
/// seller that opened it.
fn pending_task_id(state: &State, agent_name: &str) -> Option<String> {
    if state.get_str(ACTIVE_AGENT) != Some(agent_name) {
        return None;
    }
    state.get_str(TASK_ID).map(str::to_string)
}

/// Text parts verbatim; other kinds are named but not forwarded.
pub fn convert_parts(parts: &[Part]) -> Vec<String> {
    parts
        .iter()
        .map(|part| match part.as_text() {
            Some(text) => text.to_string(),
            None => format!("Unknown type: {}", part.kind()),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SendTaskInput {
    agent_name: String,
    task: String,
}

/// `send_task` tool exposed to the concierge model.
pub struct SendTaskTool {
    agent: Arc<PurchasingAgent>,
}

impl SendTaskTool {
    pub fn new(agent: Arc<PurchasingAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl Tool for SendTaskTool {
    fn name(&self) -> &str {
        "send_task"
    }

    fn description(&self) -> &str {
        "Sends a task to remote seller agent. This will send a message to the remote agent named agent_name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "description": "The name of the agent to send the task to."
                },
                "task": {
                    "type": "string",
                    "description": "The comprehensive conversation context summary and goal to be achieved regarding user inquiry and purchase request."
                }
            },
            "required": ["agent_name", "task"]
        })
    }

    async fn execute(
        &self,
        input: Value,
        context: &mut ToolExecutionContext,
    ) -> crate::brain::tools::Result<ToolResult> {
        let input: SendTaskInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let response = self
            .agent
            .send_task(&input.agent_name, &input.task, context)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(ToolResult::success(json!(response)))
    }
}
