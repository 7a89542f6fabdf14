//! Purchasing concierge: the user-facing agent that delegates to sellers.

pub mod agent;
pub mod connection;
pub mod runner;
pub mod server;
pub mod session;

pub use agent::PurchasingAgent;
pub use runner::{ChatReply, Concierge};

use crate::a2a::A2aClient;
use crate::a2a::types::{AgentCard, Task};
use crate::brain::create_provider;
use crate::config::{ConciergeConfig, Config};
use connection::TaskCallback;
use std::collections::HashMap;
use std::sync::Arc;

/// Credential presented to each seller, keyed by agent card name.
pub fn known_auth(config: &ConciergeConfig) -> HashMap<String, String> {
    HashMap::from([
        ("pizza_seller_agent".to_string(), config.pizza_auth.clone()),
        ("burger_seller_agent".to_string(), config.burger_auth.clone()),
    ])
}

/// Discover the sellers and serve the chat UI until shutdown.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let settings = &config.concierge;
    let http = A2aClient::default_http();
    let addresses = vec![settings.pizza_url.clone(), settings.burger_url.clone()];

    let callback: TaskCallback = Arc::new(|task: &Task, card: &AgentCard| {
        tracing::debug!(
            "Task {} from {} is {}",
            task.id,
            card.name,
            task.status.state
        );
    });
    let agent = PurchasingAgent::connect(&http, &addresses, &known_auth(settings), Some(callback)).await;
    if agent.list_remote_agents().is_empty() {
        tracing::warn!("No seller agents reachable; the concierge can only chat");
    }

    let model = settings
        .model
        .as_deref()
        .unwrap_or(agent::DEFAULT_CONCIERGE_MODEL);
    let provider = create_provider(&config.model, model);
    let concierge = Concierge::new(Arc::new(agent), provider, settings.max_iterations);

    server::start_server(
        &settings.host,
        settings.port,
        server::ConciergeState {
            concierge: Arc::new(concierge),
        },
    )
    .await
}
