//! Cloud Subnet Lifecycle
//!
//! Capability checks, scoped provider sessions, the raw create/update/delete
//! operations and the queue plumbing that runs them on ems_operations workers.
//!
//! ```ignore
//! let verdict = subnet.supports(LifecycleAction::Delete);
//! if verdict.is_supported() {
//!     let task = dispatcher.delete_cloud_subnet_queue(&subnet, "admin").await?;
//!     let outcome = task.wait().await;
//! }
//! ```

pub mod capability;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod notification;
pub mod repository;
pub mod runner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{LifecycleAction, UnsupportedReason, Verdict};
pub use connection::{connect, with_connection, ConnectionOptions, NetworkManager, NetworkSession, SessionGuard, ServiceKind};
pub use dispatcher::{DispatchError, SubnetDispatcher, SubnetOperation, EMS_OPERATIONS_ROLE};
pub use error::{ConnectionError, ProviderError, SubnetError, SubnetErrorKind};
pub use lifecycle::SubnetLifecycle;
pub use notification::{Notification, NotificationKind, Notifier, TracingNotifier};
pub use repository::{InMemorySubnetRepository, ManagerRegistry, SubnetRepository};
pub use runner::SubnetTaskRunner;
pub use types::{CloudNetwork, CloudSubnet, CloudTenant, SubnetCreated, SubnetOptions};
