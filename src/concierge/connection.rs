//! Connection to one remote seller.

use crate::a2a::types::{AgentCard, Metadata, Task, TaskSendParams};
use crate::a2a::{A2aClient, A2aClientError};
use std::sync::Arc;

/// Observer invoked with every task a seller returns.
pub type TaskCallback = Arc<dyn Fn(&Task, &AgentCard) + Send + Sync>;

const MESSAGE_ID: &str = "message_id";
const LAST_MESSAGE_ID: &str = "last_message_id";

#[derive(Debug, Clone)]
pub struct RemoteAgentConnection {
    client: A2aClient,
}

impl RemoteAgentConnection {
    pub fn new(client: A2aClient) -> Self {
        Self { client }
    }

    pub fn card(&self) -> &AgentCard {
        self.client.card()
    }

    /// Send `params` and stamp the returned task with the request metadata.
    ///
    /// The status message inherits the request message metadata and gets a
    /// fresh `message_id`; the previous one is kept as `last_message_id`.
    pub async fn send_task(
        &self,
        params: TaskSendParams,
        callback: Option<&TaskCallback>,
    ) -> Result<Task, A2aClientError> {
        let mut task = self.client.send_task(&params).await?;

        merge_metadata(&mut task.metadata, params.metadata.as_ref());
        if let Some(message) = task.status.message.as_mut() {
            merge_metadata(&mut message.metadata, params.message.metadata.as_ref());
            let metadata = message.metadata.get_or_insert_with(Metadata::new);
            if let Some(previous) = metadata.remove(MESSAGE_ID) {
                metadata.insert(LAST_MESSAGE_ID.to_string(), previous);
            }
            metadata.insert(
                MESSAGE_ID.to_string(),
                uuid::Uuid::new_v4().to_string().into(),
            );
        }

        if let Some(callback) = callback {
            callback(&task, self.card());
        }
        Ok(task)
    }
}

/// Copy `source` entries over `target`, creating it if needed.
pub fn merge_metadata(target: &mut Option<Metadata>, source: Option<&Metadata>) {
    let Some(source) = source else {
        return;
    };
    match target {
        Some(existing) => existing.extend(source.iter().map(|(k, v)| (k.clone(), v.clone()))),
        None => *target = Some(source.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2a::types::Message;
    use serde_json::json;
    use std::sync::Mutex;

    fn metadata(value: serde_json::Value) -> Metadata {
        serde_json::from_value(value).expect("metadata")
    }

    #[test]
    fn test_merge_metadata() {
        let mut target = None;
        merge_metadata(&mut target, None);
        assert_eq!(target, None);

        merge_metadata(&mut target, Some(&metadata(json!({"a": 1}))));
        assert_eq!(target, Some(metadata(json!({"a": 1}))));

        merge_metadata(&mut target, Some(&metadata(json!({"a": 2, "b": 3}))));
        assert_eq!(target, Some(metadata(json!({"a": 2, "b": 3}))));
    }

    #[tokio::test]
    async fn test_send_task_stamps_metadata() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": "x",
                    "result": {
                        "id": "task-1",
                        "sessionId": "conv-1",
                        "status": {
                            "state": "input-required",
                            "message": {
                                "role": "agent",
                                "parts": [{"type": "text", "text": "Confirm?"}]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let card: AgentCard = serde_json::from_value(json!({
            "name": "pizza_seller_agent",
            "url": "http://0.0.0.0:10000/",
            "version": "1.0.0",
            "capabilities": {},
            "authentication": {"schemes": ["Bearer"]},
            "defaultInputModes": ["text"],
            "defaultOutputModes": ["text"],
            "skills": []
        }))
        .expect("card");
        let connection = RemoteAgentConnection::new(A2aClient::new(
            reqwest::Client::new(),
            card,
            Some("api_key"),
            server.url(),
        ));

        let mut message = Message::user_text("2 pepperoni");
        message.metadata = Some(metadata(json!({"message_id": "m-1", "conversation_id": "conv-1"})));
        let params = TaskSendParams {
            id: "task-1".to_string(),
            session_id: "conv-1".to_string(),
            message,
            accepted_output_modes: Some(vec!["text".to_string()]),
            push_notification: None,
            history_length: None,
            metadata: Some(metadata(json!({"conversation_id": "conv-1"}))),
        };

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: TaskCallback = Arc::new(move |task: &Task, card: &AgentCard| {
            sink.lock()
                .expect("lock")
                .push((task.id.clone(), card.name.clone()));
        });

        let task = connection
            .send_task(params, Some(&callback))
            .await
            .expect("task");

        assert_eq!(task.metadata.as_ref().expect("task metadata")["conversation_id"], "conv-1");
        let status_metadata = task
            .status
            .message
            .as_ref()
            .and_then(|m| m.metadata.as_ref())
            .expect("message metadata");
        assert_eq!(status_metadata[LAST_MESSAGE_ID], "m-1");
        assert_ne!(status_metadata[MESSAGE_ID], "m-1");
        assert_eq!(status_metadata["conversation_id"], "conv-1");
        assert_eq!(
            seen.lock().expect("lock").as_slice(),
            &[("task-1".to_string(), "pizza_seller_agent".to_string())]
        );
    }
}
