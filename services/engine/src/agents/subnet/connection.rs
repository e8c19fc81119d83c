//! Scoped Provider Sessions
//!
//! A session is opened against the managing network manager for the duration
//! of one operation and released when its guard drops. Release runs on every
//! exit path, including errors and a cancelled (dropped) future.

use std::fmt;
use std::ops::Deref;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use super::error::{ConnectionError, ProviderError};
use super::types::{CloudTenant, ProviderSubnet, SubnetOptions};

/// Provider service a session is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceKind {
    Network,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Network => write!(f, "Network"),
        }
    }
}

/// Options used to open a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionOptions {
    pub service: ServiceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

impl ConnectionOptions {
    /// Network service, scoped to `tenant` when one is given
    pub fn network(tenant: Option<&CloudTenant>) -> Self {
        Self {
            service: ServiceKind::Network,
            tenant_name: tenant.map(|t| t.name.clone()),
        }
    }
}

/// A network manager able to authenticate against the provider
#[async_trait]
pub trait NetworkManager: Send + Sync {
    fn id(&self) -> u64;

    fn name(&self) -> &str;

    /// Zone whose workers serve this manager
    fn zone(&self) -> String;

    async fn open_session(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn NetworkSession>, ProviderError>;
}

/// Live session against the provider's networking API
#[async_trait]
pub trait NetworkSession: Send + Sync {
    async fn create_subnet(&self, options: &SubnetOptions) -> Result<ProviderSubnet, ProviderError>;

    async fn update_subnet(&self, ems_ref: &str, options: &SubnetOptions)
        -> Result<(), ProviderError>;

    async fn delete_subnet(&self, ems_ref: &str) -> Result<(), ProviderError>;

    /// Hand the session back to the provider. Called once, by `SessionGuard`.
    fn release(&mut self);
}

/// RAII guard owning an open session.
///
/// Dropping the guard releases the session exactly once.
pub struct SessionGuard {
    session: Box<dyn NetworkSession>,
    manager: String,
}

impl SessionGuard {
    pub fn session(&self) -> &dyn NetworkSession {
        self.session.as_ref()
    }
}

impl Deref for SessionGuard {
    type Target = dyn NetworkSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.release();
        debug!(manager = %self.manager, "Released network session");
    }
}

/// Open a session against `manager`, scoped to `tenant`.
///
/// Fails with `NoActiveConnection` before contacting anything when there is no manager.
pub async fn connect(
    manager: Option<&dyn NetworkManager>,
    tenant: Option<&CloudTenant>,
) -> Result<SessionGuard, ConnectionError> {
    let manager = manager.ok_or(ConnectionError::NoActiveConnection)?;
    let options = ConnectionOptions::network(tenant);

    debug!(
        manager = %manager.name(),
        service = %options.service,
        tenant = ?options.tenant_name,
        "Opening network session"
    );
    let session = manager.open_session(&options).await?;

    Ok(SessionGuard {
        session,
        manager: manager.name().to_string(),
    })
}

/// Run `action` with a scoped session and release it afterwards.
///
/// ```ignore
/// let subnet = with_connection(Some(manager), tenant, move |service| {
///     Box::pin(async move { service.create_subnet(&options).await })
/// })
/// .await?;
/// ```
pub async fn with_connection<T, F>(
    manager: Option<&dyn NetworkManager>,
    tenant: Option<&CloudTenant>,
    action: F,
) -> Result<T, ConnectionError>
where
    F: for<'s> FnOnce(&'s dyn NetworkSession) -> BoxFuture<'s, Result<T, ProviderError>>,
{
    let guard = connect(manager, tenant).await?;
    let result = action(guard.session()).await;
    drop(guard);
    result.map_err(ConnectionError::from)
}
