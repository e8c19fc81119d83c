//! Worker side of the subnet queue.
//!
//! Reloads the target of a queue item, runs the raw operation and applies the
//! outcome to the local record.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::agents::queue::{QueueItem, TaskFailure, TaskRunner};

use super::dispatcher::{SubnetOperation, CLOUD_SUBNET_CLASS};
use super::error::SubnetError;
use super::lifecycle::SubnetLifecycle;
use super::repository::{ManagerRegistry, SubnetRepository};
use super::types::{CloudSubnet, CloudTenant, SubnetOptions, CLOUD_TENANT_KEY};

impl From<SubnetError> for TaskFailure {
    fn from(err: SubnetError) -> Self {
        TaskFailure::new(err.to_string())
    }
}

pub struct SubnetTaskRunner {
    lifecycle: SubnetLifecycle,
    subnets: Arc<dyn SubnetRepository>,
    managers: ManagerRegistry,
}

impl SubnetTaskRunner {
    pub fn new(
        lifecycle: SubnetLifecycle,
        subnets: Arc<dyn SubnetRepository>,
        managers: ManagerRegistry,
    ) -> Self {
        Self {
            lifecycle,
            subnets,
            managers,
        }
    }

    async fn load(&self, item: &QueueItem) -> Result<CloudSubnet, TaskFailure> {
        let id = item
            .instance_id
            .ok_or_else(|| TaskFailure::new(format!("{} requires a cloud subnet id", item.method_name)))?;
        self.subnets
            .find(id)
            .await
            .ok_or_else(|| TaskFailure::new(format!("Cloud subnet {} no longer exists", id)))
    }

    async fn create(&self, manager_id: u64, options: SubnetOptions) -> Result<Value, TaskFailure> {
        let manager = self
            .managers
            .get(manager_id)
            .ok_or_else(|| TaskFailure::new(format!("Network manager {} not found", manager_id)))?;

        let tenant = options
            .get(CLOUD_TENANT_KEY)
            .cloned()
            .and_then(|value| CloudTenant::from_option(value).ok().flatten());
        let cidr = options.get("cidr").and_then(Value::as_str).map(str::to_string);

        let created = self.lifecycle.create(manager.as_ref(), options).await?;

        let mut record = CloudSubnet::new(0, created.name.clone())
            .managed_by(manager)
            .linked(created.ems_ref.clone());
        record.cidr = cidr;
        record.cloud_tenant = tenant;
        let record = self.subnets.insert(record).await;

        info!(id = record.id, ems_ref = %created.ems_ref, "Stored new cloud subnet");
        Ok(json!({
            "id": record.id,
            "ems_ref": created.ems_ref,
            "name": created.name,
        }))
    }

    async fn update(&self, item: &QueueItem, options: SubnetOptions) -> Result<Value, TaskFailure> {
        let mut subnet = self.load(item).await?;
        self.lifecycle.update(&subnet, options.clone()).await?;

        subnet.refresh_from(&options);
        if !self.subnets.save(&subnet).await {
            warn!(id = subnet.id, "Cloud subnet removed while updating");
        }
        Ok(json!({"id": subnet.id, "name": subnet.name}))
    }

    async fn delete(&self, item: &QueueItem) -> Result<Value, TaskFailure> {
        let subnet = self.load(item).await?;
        self.lifecycle.delete(&subnet).await?;

        self.subnets.remove(subnet.id).await;
        info!(id = subnet.id, "Removed cloud subnet record");
        Ok(json!({"id": subnet.id}))
    }
}

#[async_trait]
impl TaskRunner for SubnetTaskRunner {
    async fn run(&self, item: &QueueItem) -> Result<Value, TaskFailure> {
        if item.class_name != CLOUD_SUBNET_CLASS {
            return Err(TaskFailure::new(format!(
                "{} cannot run tasks for {}",
                CLOUD_SUBNET_CLASS, item.class_name
            )));
        }

        match SubnetOperation::from_queue(&item.method_name, &item.args).map_err(TaskFailure::new)? {
            SubnetOperation::Create {
                manager_id,
                options,
            } => self.create(manager_id, options).await,
            SubnetOperation::Update { options } => self.update(item, options).await,
            SubnetOperation::Delete => self.delete(item).await,
        }
    }
}
