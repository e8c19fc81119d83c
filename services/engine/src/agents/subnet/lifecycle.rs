//! Raw Subnet Lifecycle Operations
//!
//! Each operation opens a scoped session, performs one provider call and
//! normalizes any failure. These run on a worker; callers normally go through
//! `SubnetDispatcher` instead of invoking them directly.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use super::capability::LifecycleAction;
use super::connection::{with_connection, NetworkManager};
use super::error::{normalize, ConnectionError, SubnetError};
use super::notification::{with_notification, NotificationKind, NotificationSubject, Notifier};
use super::types::{CloudSubnet, CloudTenant, SubnetCreated, SubnetOptions, CLOUD_TENANT_KEY};

/// Executor for create/update/delete against the provider
#[derive(Clone)]
pub struct SubnetLifecycle {
    notifier: Arc<dyn Notifier>,
}

impl SubnetLifecycle {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Allocate a new subnet through `manager`.
    ///
    /// The `cloud_tenant` option only scopes the session and is removed before
    /// the options reach the provider.
    pub async fn create(
        &self,
        manager: &dyn NetworkManager,
        mut options: SubnetOptions,
    ) -> Result<SubnetCreated, SubnetError> {
        let name = options
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let tenant = match options.remove(CLOUD_TENANT_KEY) {
            Some(value) => CloudTenant::from_option(value).map_err(|message| {
                error!(subnet = %name, error = %message, "Rejected cloud subnet options");
                SubnetError::InvalidOptions {
                    action: LifecycleAction::Create,
                    message,
                }
            })?,
            None => None,
        };

        info!(
            subnet = %name,
            manager = %manager.name(),
            tenant = ?tenant.as_ref().map(|t| t.name.as_str()),
            "Creating cloud subnet"
        );

        let created = with_connection(Some(manager), tenant.as_ref(), move |service| {
            Box::pin(async move { service.create_subnet(&options).await })
        })
        .await
        .map_err(|e| normalize(LifecycleAction::Create, &name, e))?;

        info!(subnet = %name, ems_ref = %created.id, "Created cloud subnet");

        let name = if name.is_empty() { created.name } else { name };
        Ok(SubnetCreated {
            ems_ref: created.id,
            name,
        })
    }

    /// Push `options` to the provider subnet behind `subnet`
    pub async fn update(
        &self,
        subnet: &CloudSubnet,
        options: SubnetOptions,
    ) -> Result<(), SubnetError> {
        let ems_ref = provider_ref(subnet, LifecycleAction::Update)?;
        info!(subnet = %subnet.name, ems_ref = %ems_ref, "Updating cloud subnet");

        with_connection(subnet.manager(), subnet.cloud_tenant.as_ref(), move |service| {
            Box::pin(async move { service.update_subnet(&ems_ref, &options).await })
        })
        .await
        .map_err(|e| normalize(LifecycleAction::Update, &subnet.name, e))
    }

    /// Delete the provider subnet behind `subnet`.
    ///
    /// Exactly one delete notification is emitted with the record as subject,
    /// whatever the outcome.
    pub async fn delete(&self, subnet: &CloudSubnet) -> Result<(), SubnetError> {
        with_notification(
            self.notifier.as_ref(),
            NotificationKind::CloudSubnetDelete,
            NotificationSubject::from(subnet),
            async {
                let ems_ref = provider_ref(subnet, LifecycleAction::Delete)?;
                info!(subnet = %subnet.name, ems_ref = %ems_ref, "Deleting cloud subnet");

                with_connection(subnet.manager(), subnet.cloud_tenant.as_ref(), move |service| {
                    Box::pin(async move { service.delete_subnet(&ems_ref).await })
                })
                .await
                .map_err(|e| normalize(LifecycleAction::Delete, &subnet.name, e))
            },
        )
        .await
    }
}

/// Provider id of `subnet`, checking the managing context first
fn provider_ref(subnet: &CloudSubnet, action: LifecycleAction) -> Result<String, SubnetError> {
    if subnet.manager.is_none() {
        return Err(normalize(action, &subnet.name, ConnectionError::NoActiveConnection));
    }

    subnet.ems_ref().map(str::to_string).ok_or_else(|| {
        error!(subnet = %subnet.name, action = %action, "Cloud subnet has no provider reference");
        SubnetError::Unlinked {
            action,
            name: subnet.name.clone(),
        }
    })
}
