//! User-facing notifications around lifecycle operations.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::types::CloudSubnet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CloudSubnetDelete,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::CloudSubnetDelete => write!(f, "cloud_subnet_delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPhase {
    Success,
    Error,
}

impl fmt::Display for NotificationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationPhase::Success => write!(f, "success"),
            NotificationPhase::Error => write!(f, "error"),
        }
    }
}

/// Record a notification is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSubject {
    pub subject_type: String,
    pub id: u64,
    pub name: String,
    pub ems_ref: Option<String>,
}

impl From<&CloudSubnet> for NotificationSubject {
    fn from(subnet: &CloudSubnet) -> Self {
        Self {
            subject_type: "CloudSubnet".to_string(),
            id: subnet.id,
            name: subnet.name.clone(),
            ems_ref: subnet.ems_ref().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub phase: NotificationPhase,
    pub subject: NotificationSubject,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        phase: NotificationPhase,
        subject: NotificationSubject,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            phase,
            subject,
            message,
            created_at: Utc::now(),
        }
    }

    /// Event type as shown to users, e.g. `cloud_subnet_delete_success`
    pub fn event_type(&self) -> String {
        format!("{}_{}", self.kind, self.phase)
    }
}

/// Sink for user-facing notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Notifier that writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) {
        match notification.phase {
            NotificationPhase::Success => info!(
                event = %notification.event_type(),
                subject_id = notification.subject.id,
                subject = %notification.subject.name,
                "Notification"
            ),
            NotificationPhase::Error => warn!(
                event = %notification.event_type(),
                subject_id = notification.subject.id,
                subject = %notification.subject.name,
                message = ?notification.message,
                "Notification"
            ),
        }
    }
}

/// Run `action` and emit exactly one notification describing its outcome.
///
/// The action's result is returned unchanged.
pub async fn with_notification<T, E, F>(
    notifier: &dyn Notifier,
    kind: NotificationKind,
    subject: NotificationSubject,
    action: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let result = action.await;

    let notification = match &result {
        Ok(_) => Notification::new(kind, NotificationPhase::Success, subject, None),
        Err(e) => Notification::new(kind, NotificationPhase::Error, subject, Some(e.to_string())),
    };
    notifier.notify(notification).await;

    result
}
