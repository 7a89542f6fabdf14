//! `tasks/send` handling for a seller: validation, push notifications and
//! mapping the agent's answer onto the task lifecycle.

use super::agent::{AgentResponse, SellerAgent};
use crate::a2a::handler::TaskHandler;
use crate::a2a::push::PushNotificationSender;
use crate::a2a::task_store::{TaskStore, with_history_length};
use crate::a2a::types::*;
use async_trait::async_trait;

pub struct SellerTaskManager {
    store: TaskStore,
    agent: SellerAgent,
    push: Option<PushNotificationSender>,
    content_types: &'static [&'static str],
}

impl SellerTaskManager {
    pub fn new(
        agent: SellerAgent,
        push: Option<PushNotificationSender>,
        content_types: &'static [&'static str],
    ) -> Self {
        Self {
            store: TaskStore::new(),
            agent,
            push,
            content_types,
        }
    }

    pub fn agent(&self) -> &SellerAgent {
        &self.agent
    }

    fn validate(&self, params: &TaskSendParams) -> Result<(), JsonRpcError> {
        if !modalities_compatible(params.accepted_output_modes.as_deref(), self.content_types) {
            tracing::warn!(
                "Unsupported output mode. Received {:?}, Support {:?}",
                params.accepted_output_modes,
                self.content_types
            );
            return Err(JsonRpcError::content_type_not_supported());
        }

        if params
            .push_notification
            .as_ref()
            .is_some_and(|p| p.url.is_empty())
        {
            tracing::warn!("Push notification URL is missing");
            return Err(JsonRpcError::invalid_params(
                "Push notification URL is missing",
            ));
        }

        Ok(())
    }

    /// Verify ownership of the receiver URL, then remember it for the task.
    async fn register_push(
        &self,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> Result<(), JsonRpcError> {
        let Some(push) = &self.push else {
            return Err(JsonRpcError::push_notification_not_supported());
        };
        if !push.verify_url(&config.url).await {
            return Err(JsonRpcError::invalid_params(
                "Push notification URL is invalid",
            ));
        }
        self.store.set_push_config(task_id, config).await
    }

    async fn notify(&self, task: &Task) {
        let Some(push) = &self.push else {
            return;
        };
        if !self.store.has_push_config(&task.id).await {
            tracing::info!("No push notification info found for task {}", task.id);
            return;
        }
        match self.store.get_push_config(&task.id).await {
            Ok(config) => {
                tracing::info!("Notifying for task {} => {}", task.id, task.status.state);
                push.send(&config.url, task).await;
            }
            Err(e) => tracing::warn!("Push config lookup failed for {}: {}", task.id, e),
        }
    }

    /// Move the task to `failed` with `reason` as the agent message.
    async fn fail(&self, task_id: &str, reason: &str) {
        let status = TaskStatus::with_message(
            TaskState::Failed,
            Message::agent(vec![Part::text(reason)]),
        );
        if let Ok(task) = self.store.update_status(task_id, status, None).await {
            self.notify(&task).await;
        }
    }

    async fn apply_response(
        &self,
        params: &TaskSendParams,
        response: AgentResponse,
    ) -> Result<Task, JsonRpcError> {
        let parts = vec![Part::text(response.content)];
        let (status, artifacts) = if response.require_user_input {
            (
                TaskStatus::with_message(TaskState::InputRequired, Message::agent(parts)),
                None,
            )
        } else {
            (
                TaskStatus::new(TaskState::Completed),
                Some(vec![Artifact::from_parts(parts)]),
            )
        };

        let task = self.store.update_status(&params.id, status, artifacts).await?;
        self.notify(&task).await;
        Ok(with_history_length(&task, params.history_length))
    }
}

#[async_trait]
impl TaskHandler for SellerTaskManager {
    fn store(&self) -> &TaskStore {
        &self.store
    }

    async fn on_send_task(&self, params: TaskSendParams) -> Result<Task, JsonRpcError> {
        self.validate(&params)?;
        tracing::info!(
            "[{}] tasks/send {} (session {})",
            self.agent.kind().agent_name(),
            params.id,
            params.session_id
        );

        self.store.upsert_task(&params).await;

        if let Some(config) = params.push_notification.clone() {
            self.register_push(&params.id, config).await?;
        }

        let task = self
            .store
            .update_status(&params.id, TaskStatus::new(TaskState::Working), None)
            .await?;
        self.notify(&task).await;

        let Some(query) = params.message.parts.first().and_then(Part::as_text) else {
            let message = "Only text parts are supported";
            self.fail(&params.id, message).await;
            return Err(JsonRpcError::invalid_params(message));
        };

        match self.agent.invoke(query, &params.session_id).await {
            Ok(response) => self.apply_response(&params, response).await,
            Err(e) => {
                let message = format!("Error invoking agent: {}", e);
                tracing::error!("{}", message);
                self.fail(&params.id, &message).await;
                Err(JsonRpcError::internal(message))
            }
        }
    }

    async fn on_set_push_notification(
        &self,
        params: TaskPushNotificationConfig,
    ) -> Result<TaskPushNotificationConfig, JsonRpcError> {
        if params.push_notification_config.url.is_empty() {
            return Err(JsonRpcError::invalid_params(
                "Push notification URL is missing",
            ));
        }
        self.register_push(&params.id, params.push_notification_config.clone())
            .await?;
        Ok(params)
    }
}

/// Compatible iff either side accepts anything or the lists intersect.
pub fn modalities_compatible(requested: Option<&[String]>, supported: &[&str]) -> bool {
    match requested {
        None => true,
        Some([]) => true,
        Some(_) if supported.is_empty() => true,
        Some(requested) => requested.iter().any(|m| supported.contains(&m.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::handler::dispatch;
    use crate::seller::profile::{SUPPORTED_CONTENT_TYPES, SellerKind};
    use crate::test_helpers::{PUSH_SENDER, ScriptedProvider};
    use axum::{Router, extract::Query, routing::get};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn manager(responses: Vec<crate::brain::provider::LLMResponse>) -> SellerTaskManager {
        let agent = SellerAgent::new(
            SellerKind::Pizza,
            Arc::new(ScriptedProvider::new(responses)),
        );
        SellerTaskManager::new(agent, Some(PUSH_SENDER.clone()), SUPPORTED_CONTENT_TYPES)
    }

    fn asks_confirmation() -> Vec<crate::brain::provider::LLMResponse> {
        vec![
            ScriptedProvider::text("Pepperoni is 140K. Confirm?"),
            ScriptedProvider::text(
                r#"{"status":"input_required","message":"Pepperoni is 140K. Confirm?"}"#,
            ),
        ]
    }

    fn send(id: &str, params: serde_json::Value) -> JsonRpcRequest {
        let mut base = json!({
            "id": id,
            "sessionId": "s1",
            "message": {"role": "user", "parts": [{"type": "text", "text": "1 pepperoni"}]},
            "acceptedOutputModes": ["text", "text/plain"]
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), params.as_object()) {
            base.extend(extra.clone());
        }
        JsonRpcRequest::new(methods::SEND_TASK, base)
    }

    /// Push receiver that echoes validation tokens and forwards task states.
    async fn push_receiver() -> (String, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let app = Router::new().route(
            "/notify",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                q.get("validationToken").cloned().unwrap_or_default()
            })
            .post(move |axum::Json(task): axum::Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(task["status"]["state"].as_str().unwrap_or_default().to_string());
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}/notify", addr), rx)
    }

    #[test]
    fn test_modalities_compatible() {
        let supported = &["text", "text/plain"];
        assert!(modalities_compatible(None, supported));
        assert!(modalities_compatible(Some(&[]), supported));
        assert!(modalities_compatible(Some(&["text/plain".to_string()]), supported));
        assert!(!modalities_compatible(Some(&["image/png".to_string()]), supported));
        assert!(modalities_compatible(Some(&["image/png".to_string()]), &[]));
    }

    #[tokio::test]
    async fn test_input_required_flow() {
        let manager = manager(asks_confirmation());
        let resp = dispatch(send("t1", json!({"historyLength": 2})), &manager).await;

        let task = resp.result.expect("result");
        assert_eq!(task["status"]["state"], "input-required");
        assert_eq!(
            task["status"]["message"]["parts"][0]["text"],
            "Pepperoni is 140K. Confirm?"
        );
        assert!(task.get("artifacts").is_none());
        assert_eq!(task["history"].as_array().map(Vec::len), Some(2));
        assert_eq!(task["history"][1]["role"], "agent");
    }

    #[tokio::test]
    async fn test_completed_flow() {
        let manager = manager(vec![
            ScriptedProvider::tool_call(
                "create_pizza_order",
                json!({"order_items": [{"name": "Pepperoni Pizza", "quantity": 1, "price": 140}]}),
            ),
            ScriptedProvider::text("Order placed."),
            ScriptedProvider::text(r#"{"status":"completed","message":"Order placed."}"#),
        ]);
        let resp = dispatch(send("t1", json!({})), &manager).await;

        let task = resp.result.expect("result");
        assert_eq!(task["status"]["state"], "completed");
        assert_eq!(task["artifacts"][0]["parts"][0]["text"], "Order placed.");
        assert_eq!(task["history"], json!([]));
        assert_eq!(manager.agent().orders().len().await, 1);
    }

    #[tokio::test]
    async fn test_incompatible_output_modes() {
        let manager = manager(vec![]);
        let resp = dispatch(
            send("t1", json!({"acceptedOutputModes": ["image/png"]})),
            &manager,
        )
        .await;
        assert_eq!(
            resp.error.expect("err").code,
            error_codes::CONTENT_TYPE_NOT_SUPPORTED
        );
        assert!(manager.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_push_url_missing() {
        let manager = manager(vec![]);
        let resp = dispatch(
            send("t1", json!({"pushNotification": {"token": "x"}})),
            &manager,
        )
        .await;
        let err = resp.error.expect("err");
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        assert_eq!(err.message, "Push notification URL is missing");
    }

    #[tokio::test]
    async fn test_push_url_invalid() {
        let manager = manager(vec![]);
        let resp = dispatch(
            send(
                "t1",
                json!({"pushNotification": {"url": "http://127.0.0.1:9/notify"}}),
            ),
            &manager,
        )
        .await;
        let err = resp.error.expect("err");
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        assert_eq!(err.message, "Push notification URL is invalid");
    }

    #[tokio::test]
    async fn test_push_notifications_delivered() {
        let (url, mut rx) = push_receiver().await;
        let manager = manager(asks_confirmation());

        let resp = dispatch(send("t1", json!({"pushNotification": {"url": url}})), &manager).await;
        assert!(resp.error.is_none(), "{:?}", resp.error);

        assert_eq!(rx.recv().await.as_deref(), Some("working"));
        assert_eq!(rx.recv().await.as_deref(), Some("input-required"));

        let resp = dispatch(
            JsonRpcRequest::new(methods::GET_PUSH_NOTIFICATION, json!({"id": "t1"})),
            &manager,
        )
        .await;
        assert_eq!(
            resp.result.expect("config")["pushNotificationConfig"]["url"],
            url
        );
    }

    #[tokio::test]
    async fn test_non_text_part_rejected() {
        let manager = manager(vec![]);
        let resp = dispatch(
            send(
                "t1",
                json!({"message": {"role": "user", "parts": [{"type": "data", "data": {"a": 1}}]}}),
            ),
            &manager,
        )
        .await;
        let err = resp.error.expect("err");
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        assert_eq!(err.message, "Only text parts are supported");

        let task = manager.store().get_task("t1", None).await.expect("stored");
        assert_eq!(task.status.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn test_agent_failure_marks_task_failed() {
        let manager = manager(vec![]);
        let resp = dispatch(send("t1", json!({})), &manager).await;

        let err = resp.error.expect("err");
        assert_eq!(err.code, error_codes::INTERNAL_ERROR);
        assert!(err.message.starts_with("Error invoking agent:"));
        let task = manager.store().get_task("t1", None).await.expect("stored");
        assert_eq!(task.status.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn test_follow_up_appends_history() {
        let mut script = asks_confirmation();
        script.extend(vec![
            ScriptedProvider::text("Done."),
            ScriptedProvider::text(r#"{"status":"completed","message":"Done."}"#),
        ]);
        let manager = manager(script);

        dispatch(send("t1", json!({})), &manager).await;
        let resp = dispatch(send("t1", json!({"historyLength": 10})), &manager).await;

        let task = resp.result.expect("result");
        assert_eq!(task["status"]["state"], "completed");
        // user, agent question, user follow-up
        assert_eq!(task["history"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_set_push_without_sender() {
        let agent = SellerAgent::new(SellerKind::Burger, Arc::new(ScriptedProvider::new(vec![])));
        let manager = SellerTaskManager::new(agent, None, SUPPORTED_CONTENT_TYPES);
        let resp = dispatch(
            JsonRpcRequest::new(
                methods::SET_PUSH_NOTIFICATION,
                json!({"id": "t1", "pushNotificationConfig": {"url": "http://localhost/x"}}),
            ),
            &manager,
        )
        .await;
        assert_eq!(
            resp.error.expect("err").code,
            error_codes::PUSH_NOTIFICATION_NOT_SUPPORTED
        );
    }
}
