//! Subnet Task Dispatcher
//!
//! Turns lifecycle requests into queue items routed to the managing context's
//! zone. The worker side lives in `runner`.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::agents::queue::{Priority, QueueError, QueueItem, Scheduler, TaskHandle, TaskOptions};

use super::capability::LifecycleAction;
use super::connection::NetworkManager;
use super::types::{CloudSubnet, SubnetOptions};

/// Worker role that runs provider operations
pub const EMS_OPERATIONS_ROLE: &str = "ems_operations";

pub const CLOUD_SUBNET_CLASS: &str = "CloudSubnet";

/// Lifecycle operation as carried by a queue item
#[derive(Debug, Clone, PartialEq)]
pub enum SubnetOperation {
    Create { manager_id: u64, options: SubnetOptions },
    Update { options: SubnetOptions },
    Delete,
}

impl SubnetOperation {
    pub fn method_name(&self) -> &'static str {
        match self {
            SubnetOperation::Create { .. } => "raw_create_cloud_subnet",
            SubnetOperation::Update { .. } => "raw_update_cloud_subnet",
            SubnetOperation::Delete => "raw_delete_cloud_subnet",
        }
    }

    pub fn action(&self) -> LifecycleAction {
        match self {
            SubnetOperation::Create { .. } => LifecycleAction::Create,
            SubnetOperation::Update { .. } => LifecycleAction::Update,
            SubnetOperation::Delete => LifecycleAction::Delete,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            SubnetOperation::Create { .. } => "creating",
            SubnetOperation::Update { .. } => "updating",
            SubnetOperation::Delete => "deleting",
        }
    }

    /// Positional arguments passed to the worker
    pub fn args(&self) -> Value {
        match self {
            SubnetOperation::Create {
                manager_id,
                options,
            } => json!([manager_id, options]),
            SubnetOperation::Update { options } => json!([options]),
            SubnetOperation::Delete => json!([]),
        }
    }

    /// Rebuild the operation from a queue item's method name and arguments
    pub fn from_queue(method_name: &str, args: &Value) -> Result<Self, String> {
        let args = args.as_array().map(Vec::as_slice).unwrap_or_default();
        let options_at = |index: usize| -> Result<SubnetOptions, String> {
            match args.get(index) {
                Some(Value::Object(options)) => Ok(options.clone()),
                Some(Value::Null) | None => Ok(SubnetOptions::new()),
                Some(other) => Err(format!("{}: options must be an object, got {}", method_name, other)),
            }
        };

        match method_name {
            "raw_create_cloud_subnet" => {
                let manager_id = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| format!("{}: missing network manager id", method_name))?;
                Ok(SubnetOperation::Create {
                    manager_id,
                    options: options_at(1)?,
                })
            }
            "raw_update_cloud_subnet" => Ok(SubnetOperation::Update {
                options: options_at(0)?,
            }),
            "raw_delete_cloud_subnet" => Ok(SubnetOperation::Delete),
            other => Err(format!("unknown cloud subnet operation: {}", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("cannot queue subnet {action}: not connected to an active management system")]
    NoActiveConnection { action: LifecycleAction },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Submits subnet lifecycle work to the scheduler
#[derive(Clone)]
pub struct SubnetDispatcher {
    scheduler: Arc<dyn Scheduler>,
}

impl SubnetDispatcher {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Queue `operation` for the record with id `instance_id` under `manager`.
    ///
    /// Capabilities are not re-checked here; callers gate with `supports` first.
    pub async fn enqueue(
        &self,
        manager: Option<&dyn NetworkManager>,
        instance_id: Option<u64>,
        operation: SubnetOperation,
        userid: &str,
    ) -> Result<TaskHandle, DispatchError> {
        let action = operation.action();
        let manager = manager.ok_or_else(|| {
            warn!(action = %action, instance_id = ?instance_id, "Refusing to queue subnet operation without a network manager");
            DispatchError::NoActiveConnection { action }
        })?;

        let task = TaskOptions {
            action: format!("{} Cloud Subnet for user {}", operation.verb(), userid),
            userid: userid.to_string(),
        };
        let item = QueueItem {
            class_name: CLOUD_SUBNET_CLASS.to_string(),
            instance_id,
            method_name: operation.method_name().to_string(),
            args: operation.args(),
            priority: Priority::High,
            role: EMS_OPERATIONS_ROLE.to_string(),
            zone: manager.zone(),
        };

        info!(
            method = %item.method_name,
            instance_id = ?instance_id,
            zone = %item.zone,
            userid = %userid,
            "Queueing cloud subnet operation"
        );
        Ok(self.scheduler.submit(task, item).await?)
    }

    /// Queue a create against `manager`; the task is bound to the manager, not a record
    pub async fn create_cloud_subnet_queue(
        &self,
        manager: &dyn NetworkManager,
        userid: &str,
        options: SubnetOptions,
    ) -> Result<TaskHandle, DispatchError> {
        let operation = SubnetOperation::Create {
            manager_id: manager.id(),
            options,
        };
        self.enqueue(Some(manager), None, operation, userid).await
    }

    pub async fn update_cloud_subnet_queue(
        &self,
        subnet: &CloudSubnet,
        userid: &str,
        options: SubnetOptions,
    ) -> Result<TaskHandle, DispatchError> {
        self.enqueue(
            subnet.manager(),
            Some(subnet.id),
            SubnetOperation::Update { options },
            userid,
        )
        .await
    }

    pub async fn delete_cloud_subnet_queue(
        &self,
        subnet: &CloudSubnet,
        userid: &str,
    ) -> Result<TaskHandle, DispatchError> {
        self.enqueue(subnet.manager(), Some(subnet.id), SubnetOperation::Delete, userid)
            .await
    }
}
