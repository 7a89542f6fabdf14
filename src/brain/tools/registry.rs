//! Name-indexed set of tools available to an agent.

use super::error::{Result, ToolError};
use super::r#trait::{Tool, ToolExecutionContext, ToolResult};
use crate::brain::provider::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations sent to the model, sorted by name for stable prompts.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        context: &mut ToolExecutionContext,
    ) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(input, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Upper-case a string"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {"s": {"type": "string"}}})
        }

        async fn execute(&self, input: Value, _context: &mut ToolExecutionContext) -> Result<ToolResult> {
            let s = input["s"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidInput("s is required".to_string()))?;
            Ok(ToolResult::success(s.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn test_execute_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper));
        let mut ctx = ToolExecutionContext::default();

        let result = registry
            .execute("upper", serde_json::json!({"s": "burger"}), &mut ctx)
            .await
            .expect("executes");
        assert_eq!(result.to_text(), "BURGER");
        assert_eq!(registry.definitions()[0].name, "upper");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let mut ctx = ToolExecutionContext::default();
        let err = registry
            .execute("missing", Value::Null, &mut ctx)
            .await
            .expect_err("not found");
        assert!(matches!(err, ToolError::NotFound(ref n) if n == "missing"));
    }
}
