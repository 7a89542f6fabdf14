//! Per-conversation key/value state shared between hooks and tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(HashMap<String, Value>);

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Missing or non-boolean values read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut state = State::new();
        state.set("session_id", "abc");
        state.set("session_active", true);
        state.set("count", 3);

        assert_eq!(state.get_str("session_id"), Some("abc"));
        assert!(state.get_bool("session_active"));
        assert!(!state.get_bool("count"));
        assert!(!state.get_bool("missing"));
        assert_eq!(state.get_str("count"), None);

        assert_eq!(state.remove("count"), Some(Value::from(3)));
        assert!(!state.contains("count"));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let mut state = State::new();
        state.set("active_agent", "None");
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json, serde_json::json!({"active_agent": "None"}));
    }
}
