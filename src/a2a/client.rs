//! A2A client for talking to remote seller agents.

use crate::a2a::auth::client_auth_header;
use crate::a2a::types::*;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const AGENT_CARD_PATH: &str = ".well-known/agent.json";
/// Seller replies wait on an LLM round trip, so allow generous time.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum A2aClientError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed: HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Remote agent returned error: {0}")]
    Rpc(JsonRpcError),

    #[error("Remote agent returned neither result nor error")]
    EmptyResponse,
}

/// Fetch the agent card published at `<base_url>/.well-known/agent.json`.
pub async fn resolve_agent_card(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<AgentCard, A2aClientError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|source| A2aClientError::Http {
            url: url.clone(),
            source,
        })?;

    decode_response(&url, response).await
}

/// JSON-RPC client bound to one remote agent.
#[derive(Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    card: AgentCard,
    agent_url: String,
    auth_header: Option<String>,
}

impl std::fmt::Debug for A2aClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2aClient")
            .field("agent", &self.card.name)
            .field("agent_url", &self.agent_url)
            .field("authenticated", &self.auth_header.is_some())
            .finish()
    }
}

impl A2aClient {
    /// `agent_url` is where requests go; it may differ from the card's own URL
    /// when the card advertises a bind address rather than a reachable one.
    pub fn new(
        http: reqwest::Client,
        card: AgentCard,
        credential: Option<&str>,
        agent_url: impl Into<String>,
    ) -> Self {
        let auth_header = credential.and_then(|c| client_auth_header(&card, c));
        Self {
            http,
            card,
            agent_url: agent_url.into(),
            auth_header,
        }
    }

    /// Build the HTTP client shared by every connection.
    pub fn default_http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            })
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub async fn send_task(&self, params: &TaskSendParams) -> Result<Task, A2aClientError> {
        self.call(methods::SEND_TASK, params).await
    }

    pub async fn get_task(&self, params: &TaskQueryParams) -> Result<Task, A2aClientError> {
        self.call(methods::GET_TASK, params).await
    }

    pub async fn cancel_task(&self, params: &TaskIdParams) -> Result<Task, A2aClientError> {
        self.call(methods::CANCEL_TASK, params).await
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<R, A2aClientError> {
        let params = serde_json::to_value(params).map_err(|e| A2aClientError::Decode {
            url: self.agent_url.clone(),
            message: e.to_string(),
        })?;
        let request = JsonRpcRequest::new(method, params);

        let mut builder = self.http.post(&self.agent_url).json(&request);
        if let Some(auth) = &self.auth_header {
            builder = builder.header(AUTHORIZATION, auth);
        }

        tracing::debug!("A2A client: {} -> {}", method, self.agent_url);
        let response = builder.send().await.map_err(|source| A2aClientError::Http {
            url: self.agent_url.clone(),
            source,
        })?;

        let rpc: JsonRpcResponse = decode_response(&self.agent_url, response).await?;
        if let Some(error) = rpc.error {
            return Err(A2aClientError::Rpc(error));
        }
        let result = rpc.result.ok_or(A2aClientError::EmptyResponse)?;
        serde_json::from_value(result).map_err(|e| A2aClientError::Decode {
            url: self.agent_url.clone(),
            message: e.to_string(),
        })
    }
}

async fn decode_response<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, A2aClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(A2aClientError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await.map_err(|source| A2aClientError::Http {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| A2aClientError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
