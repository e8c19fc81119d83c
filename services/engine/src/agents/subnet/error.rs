//! Subnet Error Types
//!
//! Provider failures are normalized into typed subnet errors whose message is
//! the human-readable text from the provider's response body.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use super::capability::LifecycleAction;

/// Failure raised by the provider layer (Keystone or Neutron)
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP response; `body` is the raw payload
    #[error("network service returned {status}: {body}")]
    Response { status: u16, body: String },

    /// The request never produced a response
    #[error("request to network service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("unexpected response from network service: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Response payload, when the provider sent one
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ProviderError::Response { body, .. } if !body.trim().is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Failure while acquiring or using a scoped session
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no active connection to a network manager")]
    NoActiveConnection,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetErrorKind {
    NoActiveConnection,
    Unlinked,
    InvalidOptions,
    Create,
    Update,
    Delete,
}

/// Errors raised by subnet lifecycle operations
#[derive(Debug, Error)]
pub enum SubnetError {
    /// The record has no managing context; nothing was sent to the provider
    #[error("cannot {action} subnet: not connected to an active management system")]
    NoActiveConnection { action: LifecycleAction },

    /// The record was never linked to a provider subnet
    #[error("cannot {action} subnet '{name}': it has no provider reference")]
    Unlinked { action: LifecycleAction, name: String },

    #[error("invalid options for subnet {action}: {message}")]
    InvalidOptions {
        action: LifecycleAction,
        message: String,
    },

    #[error("{message}")]
    Create {
        message: String,
        #[source]
        source: ProviderError,
    },

    #[error("{message}")]
    Update {
        message: String,
        #[source]
        source: ProviderError,
    },

    #[error("{message}")]
    Delete {
        message: String,
        #[source]
        source: ProviderError,
    },
}

impl SubnetError {
    pub fn kind(&self) -> SubnetErrorKind {
        match self {
            SubnetError::NoActiveConnection { .. } => SubnetErrorKind::NoActiveConnection,
            SubnetError::Unlinked { .. } => SubnetErrorKind::Unlinked,
            SubnetError::InvalidOptions { .. } => SubnetErrorKind::InvalidOptions,
            SubnetError::Create { .. } => SubnetErrorKind::Create,
            SubnetError::Update { .. } => SubnetErrorKind::Update,
            SubnetError::Delete { .. } => SubnetErrorKind::Delete,
        }
    }

    pub fn action(&self) -> LifecycleAction {
        match self {
            SubnetError::NoActiveConnection { action }
            | SubnetError::Unlinked { action, .. }
            | SubnetError::InvalidOptions { action, .. } => *action,
            SubnetError::Create { .. } => LifecycleAction::Create,
            SubnetError::Update { .. } => LifecycleAction::Update,
            SubnetError::Delete { .. } => LifecycleAction::Delete,
        }
    }
}

/// Human-readable message for a provider failure.
///
/// Uses the innermost `message` field of a JSON response body
/// (`{"NeutronError": {"message": ...}}`, `{"error": {"message": ...}}`),
/// falling back to the error's own text.
pub fn error_message(err: &ProviderError) -> String {
    err.response_body()
        .and_then(|body| serde_json::from_str::<Value>(body).ok())
        .and_then(|json| innermost_message(&json).map(str::to_string))
        .unwrap_or_else(|| err.to_string())
}

fn innermost_message(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(key, _)| key.as_str() != "message")
            .find_map(|(_, nested)| innermost_message(nested))
            .or_else(|| {
                map.get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.trim().is_empty())
            }),
        Value::Array(items) => items.iter().find_map(innermost_message),
        _ => None,
    }
}

/// Log a failed operation and turn it into the subnet error for `action`.
pub fn normalize(action: LifecycleAction, subnet_name: &str, err: ConnectionError) -> SubnetError {
    match err {
        ConnectionError::NoActiveConnection => {
            error!(
                subnet = %subnet_name,
                action = %action,
                error = "no active connection to a network manager",
                "Cloud subnet operation failed"
            );
            SubnetError::NoActiveConnection { action }
        }
        ConnectionError::Provider(source) => {
            error!(
                subnet = %subnet_name,
                action = %action,
                error = %source,
                "Cloud subnet operation failed"
            );
            let message = error_message(&source);
            match action {
                LifecycleAction::Create => SubnetError::Create { message, source },
                LifecycleAction::Update => SubnetError::Update { message, source },
                LifecycleAction::Delete => SubnetError::Delete { message, source },
            }
        }
    }
}
