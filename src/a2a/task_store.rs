//! In-memory task bookkeeping shared by every seller.
//!
//! Holds tasks and their push notification configs. Agent-specific behaviour
//! (what `tasks/send` actually does) lives in the seller task manager; this
//! store only enforces the state rules.

use crate::a2a::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Task>,
    push_configs: HashMap<String, PushNotificationConfig>,
}

/// Cheaply cloneable handle to the task store.
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<RwLock<Inner>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the task on first sight, otherwise append the new message to its history.
    pub async fn upsert_task(&self, params: &TaskSendParams) -> Task {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .entry(params.id.clone())
            .and_modify(|task| {
                task.history
                    .get_or_insert_with(Vec::new)
                    .push(params.message.clone());
            })
            .or_insert_with(|| Task {
                id: params.id.clone(),
                session_id: Some(params.session_id.clone()),
                status: TaskStatus::new(TaskState::Submitted),
                artifacts: None,
                history: Some(vec![params.message.clone()]),
                metadata: params.metadata.clone(),
            });
        task.clone()
    }

    /// Replace the task status, recording its message in history and appending artifacts.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        artifacts: Option<Vec<Artifact>>,
    ) -> Result<Task, JsonRpcError> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.get_mut(task_id) else {
            tracing::error!("Task {} not found for updating the task", task_id);
            return Err(JsonRpcError::task_not_found());
        };

        if let Some(message) = &status.message {
            task.history
                .get_or_insert_with(Vec::new)
                .push(message.clone());
        }
        task.status = status;
        task.status.timestamp = Some(chrono::Utc::now().to_rfc3339());

        if let Some(new_artifacts) = artifacts {
            task.artifacts
                .get_or_insert_with(Vec::new)
                .extend(new_artifacts);
        }

        Ok(task.clone())
    }

    /// Fetch a task with its history trimmed to the last `history_length` messages.
    pub async fn get_task(
        &self,
        task_id: &str,
        history_length: Option<usize>,
    ) -> Result<Task, JsonRpcError> {
        let inner = self.inner.read().await;
        match inner.tasks.get(task_id) {
            Some(task) => Ok(with_history_length(task, history_length)),
            None => Err(JsonRpcError::task_not_found()),
        }
    }

    /// Cancel a task that is waiting on its caller.
    ///
    /// Tasks run to completion inside `tasks/send`, so only `submitted` and
    /// `input-required` tasks are still interruptible.
    pub async fn cancel_task(&self, task_id: &str) -> Result<Task, JsonRpcError> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.get_mut(task_id) else {
            return Err(JsonRpcError::task_not_found());
        };

        match task.status.state {
            TaskState::Submitted | TaskState::InputRequired => {
                task.status = TaskStatus::new(TaskState::Canceled);
                tracing::info!("A2A: Canceled task {}", task_id);
                Ok(task.clone())
            }
            state => {
                tracing::debug!("A2A: Refusing to cancel task {} in {} state", task_id, state);
                Err(JsonRpcError::task_not_cancelable())
            }
        }
    }

    pub async fn set_push_config(
        &self,
        task_id: &str,
        config: PushNotificationConfig,
    ) -> Result<(), JsonRpcError> {
        let mut inner = self.inner.write().await;
        if !inner.tasks.contains_key(task_id) {
            return Err(JsonRpcError::task_not_found());
        }
        inner.push_configs.insert(task_id.to_string(), config);
        Ok(())
    }

    pub async fn get_push_config(&self, task_id: &str) -> Result<PushNotificationConfig, JsonRpcError> {
        let inner = self.inner.read().await;
        if !inner.tasks.contains_key(task_id) {
            return Err(JsonRpcError::task_not_found());
        }
        inner.push_configs.get(task_id).cloned().ok_or_else(|| {
            JsonRpcError::internal("An error occurred while getting push notification info")
        })
    }

    pub async fn has_push_config(&self, task_id: &str) -> bool {
        self.inner.read().await.push_configs.contains_key(task_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Copy of `task` keeping only the last `history_length` history entries.
pub fn with_history_length(task: &Task, history_length: Option<usize>) -> Task {
    let mut copy = task.clone();
    copy.history = match (history_length, &task.history) {
        (Some(n), Some(history)) if n > 0 => {
            let start = history.len().saturating_sub(n);
            Some(history[start..].to_vec())
        }
        _ => Some(Vec::new()),
    };
    copy
}
