//! Task Queue
//!
//! Contract between the dispatcher and whatever runs queued work, plus an
//! in-process worker pool implementing it.

pub mod pool;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

pub use pool::{WorkerPool, DEFAULT_TASK_RETENTION};
pub use types::{Priority, QueueItem, Route, TaskOptions, TaskState, TaskStatus};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("no workers serve zone '{zone}' role '{role}'")]
    NoWorkers { zone: String, role: String },

    #[error("queue for zone '{zone}' role '{role}' is full")]
    Full { zone: String, role: String },

    #[error("queue for zone '{zone}' role '{role}' is closed")]
    Closed { zone: String, role: String },
}

/// Accepts units of work for asynchronous execution
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn submit(&self, task: TaskOptions, item: QueueItem) -> Result<TaskHandle, QueueError>;
}

/// Failure reported by a task runner; the message is shown to the user as is
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Worker-side executor for queue items
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, item: &QueueItem) -> Result<Value, TaskFailure>;
}

/// Caller's view of a submitted task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task_id: String,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn new(task_id: String, state: watch::Receiver<TaskState>) -> Self {
        Self { task_id, state }
    }

    pub fn id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Wait for the terminal state.
    ///
    /// If the scheduler goes away first, the last observed state is returned.
    pub async fn wait(mut self) -> TaskState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }
}
