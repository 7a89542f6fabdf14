//! Brain Module
//!
//! LLM provider abstraction, tool registry and the agent loop the sellers
//! and the concierge run their turns with.

pub mod agent;
pub mod provider;
pub mod state;
pub mod tools;

// Re-exports
pub use agent::{AgentError, AgentHooks, AgentLoop, TurnOutcome};
pub use provider::{Provider, create_provider};
pub use state::State;
pub use tools::{Tool, ToolExecutionContext, ToolRegistry, ToolResult};
