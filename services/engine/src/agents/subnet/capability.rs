//! Capability checks for subnet lifecycle actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::CloudSubnet;

/// Lifecycle action on a cloud subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Create => write!(f, "create"),
            LifecycleAction::Update => write!(f, "update"),
            LifecycleAction::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(LifecycleAction::Create),
            "update" => Ok(LifecycleAction::Update),
            "delete" => Ok(LifecycleAction::Delete),
            other => Err(format!("unknown lifecycle action: {}", other)),
        }
    }
}

/// Why an action is not available right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnsupportedReason {
    /// No managing network manager
    NotConnected,
    /// Instances still attached through the subnet's network
    ActiveInstances { count: usize },
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedReason::NotConnected => {
                write!(f, "The subnet is not connected to an active management system")
            }
            UnsupportedReason::ActiveInstances { count: 1 } => {
                write!(f, "The subnet has an active instance")
            }
            UnsupportedReason::ActiveInstances { count } => {
                write!(f, "The subnet has {} active instances", count)
            }
        }
    }
}

/// Outcome of a capability check. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    action: LifecycleAction,
    reasons: Vec<UnsupportedReason>,
}

impl Verdict {
    pub fn supported(action: LifecycleAction) -> Self {
        Self {
            action,
            reasons: Vec::new(),
        }
    }

    fn deny(&mut self, reason: UnsupportedReason) {
        self.reasons.push(reason);
    }

    pub fn action(&self) -> LifecycleAction {
        self.action
    }

    pub fn is_supported(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[UnsupportedReason] {
        &self.reasons
    }

    /// All reasons joined for display, `None` when supported
    pub fn unsupported_reason(&self) -> Option<String> {
        if self.is_supported() {
            return None;
        }
        let reasons: Vec<String> = self.reasons.iter().map(|r| r.to_string()).collect();
        Some(reasons.join("; "))
    }
}

impl CloudSubnet {
    /// Create has no precondition on an existing record
    pub fn supports_create() -> Verdict {
        Verdict::supported(LifecycleAction::Create)
    }

    /// Check whether `action` may run against this record now.
    ///
    /// Every violated condition contributes its own reason, so a delete on a
    /// disconnected subnet with attached instances reports both.
    pub fn supports(&self, action: LifecycleAction) -> Verdict {
        let mut verdict = Verdict::supported(action);

        match action {
            LifecycleAction::Create => {}
            LifecycleAction::Update => {
                if self.manager.is_none() {
                    verdict.deny(UnsupportedReason::NotConnected);
                }
            }
            LifecycleAction::Delete => {
                if self.manager.is_none() {
                    verdict.deny(UnsupportedReason::NotConnected);
                }
                let count = self.number_of_vms();
                if count > 0 {
                    verdict.deny(UnsupportedReason::ActiveInstances { count });
                }
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::subnet::testing::FakeManager;
    use crate::agents::subnet::types::CloudNetwork;

    fn network_with_vms(count: usize) -> CloudNetwork {
        CloudNetwork {
            ems_ref: Some("net-1".to_string()),
            name: "private".to_string(),
            vm_ids: (0..count).map(|i| format!("vm-{}", i)).collect(),
        }
    }

    #[test]
    fn test_create_always_supported() {
        assert!(CloudSubnet::supports_create().is_supported());
        assert!(CloudSubnet::new(1, "orphan")
            .supports(LifecycleAction::Create)
            .is_supported());
    }

    #[test]
    fn test_disconnected_subnet_denies_update_and_delete() {
        let subnet = CloudSubnet::new(1, "orphan").linked("abc-123");

        for action in [LifecycleAction::Update, LifecycleAction::Delete] {
            let verdict = subnet.supports(action);
            assert!(!verdict.is_supported());
            assert!(verdict.reasons().contains(&UnsupportedReason::NotConnected));
            assert!(verdict
                .unsupported_reason()
                .unwrap()
                .contains("not connected to an active management system"));
        }
    }

    #[test]
    fn test_connected_subnet_without_vms_is_fully_supported() {
        let subnet = CloudSubnet::new(1, "sub1")
            .managed_by(FakeManager::new("zone-a"))
            .linked("abc-123");

        assert!(subnet.supports(LifecycleAction::Update).is_supported());
        assert!(subnet.supports(LifecycleAction::Delete).is_supported());
        assert_eq!(subnet.supports(LifecycleAction::Delete).unsupported_reason(), None);
    }

    #[test]
    fn test_attached_vms_deny_delete_only() {
        let subnet = CloudSubnet::new(1, "sub1")
            .managed_by(FakeManager::new("zone-a"))
            .on_network(network_with_vms(2));

        let verdict = subnet.supports(LifecycleAction::Delete);
        assert!(!verdict.is_supported());
        assert_eq!(
            verdict.reasons(),
            &[UnsupportedReason::ActiveInstances { count: 2 }]
        );
        assert!(verdict.unsupported_reason().unwrap().contains("active"));

        assert!(subnet.supports(LifecycleAction::Update).is_supported());
    }

    #[test]
    fn test_delete_reasons_accumulate() {
        let subnet = CloudSubnet::new(1, "sub1").on_network(network_with_vms(1));

        let verdict = subnet.supports(LifecycleAction::Delete);
        assert_eq!(
            verdict.reasons(),
            &[
                UnsupportedReason::NotConnected,
                UnsupportedReason::ActiveInstances { count: 1 }
            ]
        );
        assert_eq!(
            verdict.unsupported_reason().unwrap(),
            "The subnet is not connected to an active management system; The subnet has an active instance"
        );
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!("delete".parse::<LifecycleAction>(), Ok(LifecycleAction::Delete));
        assert!("resize".parse::<LifecycleAction>().is_err());
        assert_eq!(LifecycleAction::Update.to_string(), "update");
    }

    #[test]
    fn test_reason_serialization_is_tagged() {
        let json = serde_json::to_value(UnsupportedReason::ActiveInstances { count: 3 }).unwrap();
        assert_eq!(json["reason"], "active_instances");
        assert_eq!(json["count"], 3);
    }
}
