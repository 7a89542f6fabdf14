//! Agent Card generation for `.well-known/agent.json`.
//!
//! Sellers describe themselves with a single skill and a single auth scheme;
//! the card URL is derived from the address the server binds to.

use crate::a2a::types::*;

/// Static identity of an agent, independent of where it is served.
#[derive(Debug, Clone)]
pub struct CardIdentity {
    pub name: &'static str,
    pub description: &'static str,
    /// Auth scheme advertised to clients, e.g. `Basic` or `Bearer`.
    pub auth_scheme: &'static str,
    pub skill: AgentSkill,
    pub content_types: &'static [&'static str],
    pub push_notifications: bool,
}

/// Build the Agent Card for an agent served on `host:port`.
pub fn build_agent_card(identity: &CardIdentity, host: &str, port: u16) -> AgentCard {
    let modes: Vec<String> = identity
        .content_types
        .iter()
        .map(|m| m.to_string())
        .collect();

    AgentCard {
        name: identity.name.to_string(),
        description: Some(identity.description.to_string()),
        // Bind address stands in for a public domain name.
        url: format!("http://{}:{}/", host, port),
        provider: None,
        version: "1.0.0".to_string(),
        documentation_url: None,
        capabilities: AgentCapabilities {
            streaming: false,
            push_notifications: identity.push_notifications,
            state_transition_history: false,
        },
        authentication: Some(AgentAuthentication {
            schemes: vec![identity.auth_scheme.to_string()],
            credentials: None,
        }),
        default_input_modes: modes.clone(),
        default_output_modes: modes,
        skills: vec![identity.skill.clone()],
    }
}
