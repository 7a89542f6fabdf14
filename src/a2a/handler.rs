//! JSON-RPC 2.0 handler for A2A protocol operations.
//!
//! Dispatches JSON-RPC methods:
//! - `tasks/send`                   → agent-specific [`TaskHandler::on_send_task`]
//! - `tasks/get`                    → retrieve task by ID
//! - `tasks/cancel`                 → cancel a task waiting on input
//! - `tasks/pushNotification/set`   → register a push notification receiver
//! - `tasks/pushNotification/get`   → read it back
//! - `tasks/sendSubscribe`, `tasks/resubscribe` → unsupported (no streaming)

use crate::a2a::task_store::TaskStore;
use crate::a2a::types::*;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Agent-specific side of the task protocol.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Backing store used for the generic task methods.
    fn store(&self) -> &TaskStore;

    /// Run the agent for an incoming `tasks/send`.
    async fn on_send_task(&self, params: TaskSendParams) -> Result<Task, JsonRpcError>;

    /// Register a push notification receiver for an existing task.
    async fn on_set_push_notification(
        &self,
        params: TaskPushNotificationConfig,
    ) -> Result<TaskPushNotificationConfig, JsonRpcError> {
        self.store()
            .set_push_config(&params.id, params.push_notification_config.clone())
            .await?;
        Ok(params)
    }
}

/// Dispatch a JSON-RPC request to the appropriate handler.
pub async fn dispatch(req: JsonRpcRequest, handler: &dyn TaskHandler) -> JsonRpcResponse {
    let id = req.id.clone();
    let result = match req.method.as_str() {
        methods::SEND_TASK => match parse_params::<TaskSendParams>(req.params) {
            Ok(params) => handler.on_send_task(params).await.and_then(to_result),
            Err(e) => Err(e),
        },
        methods::GET_TASK => match parse_params::<TaskQueryParams>(req.params) {
            Ok(params) => {
                tracing::info!("A2A: Getting task {}", params.id);
                handler
                    .store()
                    .get_task(&params.id, params.history_length)
                    .await
                    .and_then(to_result)
            }
            Err(e) => Err(e),
        },
        methods::CANCEL_TASK => match parse_params::<TaskIdParams>(req.params) {
            Ok(params) => handler
                .store()
                .cancel_task(&params.id)
                .await
                .and_then(to_result),
            Err(e) => Err(e),
        },
        methods::SET_PUSH_NOTIFICATION => {
            match parse_params::<TaskPushNotificationConfig>(req.params) {
                Ok(params) => handler
                    .on_set_push_notification(params)
                    .await
                    .and_then(to_result),
                Err(e) => Err(e),
            }
        }
        methods::GET_PUSH_NOTIFICATION => match parse_params::<TaskIdParams>(req.params) {
            Ok(params) => handler
                .store()
                .get_push_config(&params.id)
                .await
                .map(|config| TaskPushNotificationConfig {
                    id: params.id,
                    push_notification_config: config,
                })
                .and_then(to_result),
            Err(e) => Err(e),
        },
        methods::SEND_TASK_SUBSCRIBE | methods::RESUBSCRIBE => {
            Err(JsonRpcError::unsupported_operation())
        }
        other => {
            tracing::warn!("A2A: Unexpected method {}", other);
            Err(JsonRpcError::method_not_found(other))
        }
    };

    match result {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(error) => JsonRpcResponse::error(id, error),
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal(format!("Failed to serialize result: {}", e)))
}
