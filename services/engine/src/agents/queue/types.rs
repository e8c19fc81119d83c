use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue priority. Each priority has its own lane; higher lanes drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

/// Zone and role pair that selects which workers may run a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub zone: String,
    pub role: String,
}

impl Route {
    pub fn new(zone: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.role)
    }
}

/// Task-level options shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Human-readable label, e.g. `deleting Cloud Subnet for user admin`
    pub action: String,
    pub userid: String,
}

/// Unit of work as delivered to a worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub class_name: String,
    pub instance_id: Option<u64>,
    pub method_name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub priority: Priority,
    pub role: String,
    pub zone: String,
}

impl QueueItem {
    pub fn route(&self) -> Route {
        Route::new(self.zone.clone(), self.role.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Succeeded { result: Value },
    Failed { message: String },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded { .. } | TaskState::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Succeeded { .. } => "succeeded",
            TaskState::Failed { .. } => "failed",
        }
    }
}

/// Listing view of a submitted task
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub action: String,
    pub userid: String,
    pub zone: String,
    pub role: String,
    pub method_name: String,
    pub instance_id: Option<u64>,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(serde_json::to_value(Priority::High).unwrap(), "high");
    }

    #[test]
    fn test_state_serialization_is_tagged() {
        let json = serde_json::to_value(TaskState::Failed {
            message: "Subnet is in use".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "message": "Subnet is in use"}));

        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Succeeded { result: Value::Null }.is_terminal());
    }
}
