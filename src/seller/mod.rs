//! Seller agents (burger and pizza) served over A2A.

pub mod agent;
pub mod order;
pub mod profile;
pub mod task_manager;

pub use agent::{AgentResponse, SellerAgent};
pub use profile::SellerKind;
pub use task_manager::SellerTaskManager;

use crate::a2a::agent_card::build_agent_card;
use crate::a2a::auth::AuthScheme;
use crate::a2a::push::PushNotificationSender;
use crate::a2a::server::{A2aState, start_server};
use crate::brain::create_provider;
use crate::config::Config;
use anyhow::Context;
use std::sync::Arc;

/// Build the seller's A2A state from configuration.
pub async fn build_state(kind: SellerKind, config: &Config) -> anyhow::Result<A2aState> {
    let seller = kind.config(config);
    let card = build_agent_card(&kind.identity(), &seller.host, seller.port);

    let auth = AuthScheme::from_card(
        &card,
        seller.api_key.as_deref(),
        seller.username.as_deref(),
        seller.password.as_deref(),
    )
    .with_context(|| format!("Invalid auth configuration for {}", card.name))?;

    let push = tokio::task::spawn_blocking(PushNotificationSender::generate)
        .await
        .context("Push key generation task panicked")?
        .context("Failed to generate push notification key")?;

    let model = seller
        .model
        .as_deref()
        .unwrap_or(profile::DEFAULT_SELLER_MODEL);
    let provider = create_provider(&config.model, model);
    let agent = SellerAgent::new(kind, provider);
    let handler = SellerTaskManager::new(agent, Some(push.clone()), profile::SUPPORTED_CONTENT_TYPES);

    tracing::info!(
        "{} ready (auth: {}, push notifications: on)",
        card.name,
        auth.name()
    );

    Ok(A2aState {
        card: Arc::new(card),
        auth,
        handler: Arc::new(handler),
        push: Some(push),
    })
}

/// Run a seller until shutdown.
pub async fn run(kind: SellerKind, config: &Config) -> anyhow::Result<()> {
    let state = build_state(kind, config).await?;
    let seller = kind.config(config);
    start_server(&seller.host, seller.port, state).await
}
