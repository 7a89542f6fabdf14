//! Tools callable by the model during an agent turn.

pub mod error;
pub mod registry;
pub mod r#trait;

pub use error::{Result, ToolError};
pub use registry::ToolRegistry;
pub use r#trait::{Tool, ToolExecutionContext, ToolResult};
