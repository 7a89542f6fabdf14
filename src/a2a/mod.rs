//! A2A (Agent-to-Agent) protocol plumbing shared by sellers and the concierge.
//!
//! - Agent Card discovery (`.well-known/agent.json`)
//! - JSON-RPC 2.0 task API (`tasks/send`, `tasks/get`, `tasks/cancel`,
//!   `tasks/pushNotification/*`)
//! - Shared-secret auth (Basic / Bearer)
//! - Signed push notifications
//! - HTTP server (axum) and client (reqwest)

pub mod agent_card;
pub mod auth;
pub mod client;
pub mod handler;
pub mod push;
pub mod server;
pub mod task_store;
pub mod types;

pub use client::{A2aClient, A2aClientError, resolve_agent_card};
pub use server::start_server;
