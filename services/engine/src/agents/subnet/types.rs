//! Cloud Subnet Types
//!
//! The local mirror of a Neutron subnet and the values that flow through
//! its lifecycle operations.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::connection::NetworkManager;

/// Attribute map submitted to create/update (name, cidr, gateway_ip, ...).
pub type SubnetOptions = Map<String, Value>;

/// Option key carrying the tenant placement; never forwarded to the provider.
pub const CLOUD_TENANT_KEY: &str = "cloud_tenant";

/// A project/account scope inside the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudTenant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl CloudTenant {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Parse a `cloud_tenant` option value: a bare tenant name or an object with a `name`.
    pub fn from_option(value: Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::String(name) if name.trim().is_empty() => Ok(None),
            Value::String(name) => Ok(Some(Self::named(name))),
            Value::Object(map) => serde_json::from_value(Value::Object(map))
                .map(Some)
                .map_err(|e| format!("cloud_tenant: {}", e)),
            other => Err(format!(
                "cloud_tenant must be a tenant name or object, got {}",
                other
            )),
        }
    }
}

/// The network a subnet is carved from, with the instances attached to it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudNetwork {
    #[serde(default)]
    pub ems_ref: Option<String>,
    pub name: String,
    #[serde(default)]
    pub vm_ids: Vec<String>,
}

/// Local record mirroring a subnet at the provider.
///
/// Starts unlinked (no `ems_ref`), becomes linked once a create reports the
/// provider id. The provider id cannot change after that.
#[derive(Clone)]
pub struct CloudSubnet {
    pub id: u64,
    ems_ref: Option<String>,
    pub name: String,
    pub cidr: Option<String>,
    /// Managing network manager; `None` once the manager is gone
    pub manager: Option<Arc<dyn NetworkManager>>,
    pub cloud_tenant: Option<CloudTenant>,
    pub network: Option<CloudNetwork>,
}

impl CloudSubnet {
    /// Create an unlinked, unmanaged record
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            ems_ref: None,
            name: name.into(),
            cidr: None,
            manager: None,
            cloud_tenant: None,
            network: None,
        }
    }

    pub fn managed_by(mut self, manager: Arc<dyn NetworkManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn in_tenant(mut self, tenant: CloudTenant) -> Self {
        self.cloud_tenant = Some(tenant);
        self
    }

    pub fn on_network(mut self, network: CloudNetwork) -> Self {
        self.network = Some(network);
        self
    }

    pub fn linked(mut self, ems_ref: impl Into<String>) -> Self {
        self.link(ems_ref);
        self
    }

    /// Provider reference id, present once the subnet exists remotely
    pub fn ems_ref(&self) -> Option<&str> {
        self.ems_ref.as_deref()
    }

    pub fn is_linked(&self) -> bool {
        self.ems_ref.is_some()
    }

    /// Link the record to its provider id. Returns `false` if already linked.
    pub fn link(&mut self, ems_ref: impl Into<String>) -> bool {
        if self.ems_ref.is_some() {
            return false;
        }
        self.ems_ref = Some(ems_ref.into());
        true
    }

    pub fn manager(&self) -> Option<&dyn NetworkManager> {
        self.manager.as_deref()
    }

    /// Instances attached through the subnet's network
    pub fn number_of_vms(&self) -> usize {
        self.network.as_ref().map_or(0, |n| n.vm_ids.len())
    }

    /// Refresh local attributes from options accepted by the provider
    pub fn refresh_from(&mut self, options: &SubnetOptions) {
        if let Some(name) = options.get("name").and_then(Value::as_str) {
            self.name = name.to_string();
        }
        if let Some(cidr) = options.get("cidr").and_then(Value::as_str) {
            self.cidr = Some(cidr.to_string());
        }
    }

    pub fn summary(&self) -> SubnetSummary {
        SubnetSummary {
            id: self.id,
            ems_ref: self.ems_ref.clone(),
            name: self.name.clone(),
            cidr: self.cidr.clone(),
            manager: self.manager().map(|m| m.name().to_string()),
            cloud_tenant: self.cloud_tenant.as_ref().map(|t| t.name.clone()),
            network: self.network.as_ref().map(|n| n.name.clone()),
            number_of_vms: self.number_of_vms(),
        }
    }
}

impl fmt::Debug for CloudSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudSubnet")
            .field("id", &self.id)
            .field("ems_ref", &self.ems_ref)
            .field("name", &self.name)
            .field("cidr", &self.cidr)
            .field("manager", &self.manager().map(|m| m.name()))
            .field("cloud_tenant", &self.cloud_tenant)
            .field("network", &self.network)
            .finish()
    }
}

/// Serializable view of a subnet record
#[derive(Debug, Clone, Serialize)]
pub struct SubnetSummary {
    pub id: u64,
    pub ems_ref: Option<String>,
    pub name: String,
    pub cidr: Option<String>,
    pub manager: Option<String>,
    pub cloud_tenant: Option<String>,
    pub network: Option<String>,
    pub number_of_vms: usize,
}

/// Subnet as reported back by the provider
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSubnet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
}

/// Result of a successful create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetCreated {
    pub ems_ref: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_from_name_or_object() {
        assert_eq!(
            CloudTenant::from_option(json!("admin")).unwrap(),
            Some(CloudTenant::named("admin"))
        );
        assert_eq!(
            CloudTenant::from_option(json!({"id": "t-1", "name": "demo"})).unwrap(),
            Some(CloudTenant {
                id: Some("t-1".to_string()),
                name: "demo".to_string()
            })
        );
        assert_eq!(CloudTenant::from_option(Value::Null).unwrap(), None);
        assert_eq!(CloudTenant::from_option(json!("  ")).unwrap(), None);
    }

    #[test]
    fn test_tenant_rejects_other_shapes() {
        assert!(CloudTenant::from_option(json!(42)).is_err());
        assert!(CloudTenant::from_option(json!({"id": "no-name"})).is_err());
    }

    #[test]
    fn test_ems_ref_is_immutable_once_linked() {
        let mut subnet = CloudSubnet::new(1, "sub1");
        assert!(!subnet.is_linked());

        assert!(subnet.link("abc-123"));
        assert!(!subnet.link("other"));
        assert_eq!(subnet.ems_ref(), Some("abc-123"));
    }

    #[test]
    fn test_vm_count_follows_network() {
        let subnet = CloudSubnet::new(1, "sub1");
        assert_eq!(subnet.number_of_vms(), 0);

        let subnet = subnet.on_network(CloudNetwork {
            ems_ref: Some("net-1".to_string()),
            name: "private".to_string(),
            vm_ids: vec!["vm-1".to_string(), "vm-2".to_string()],
        });
        assert_eq!(subnet.number_of_vms(), 2);
    }

    #[test]
    fn test_refresh_from_options() {
        let mut subnet = CloudSubnet::new(1, "sub1");
        subnet.cidr = Some("10.0.0.0/24".to_string());
        let options = json!({"name": "renamed", "enable_dhcp": false});
        subnet.refresh_from(options.as_object().unwrap());

        assert_eq!(subnet.name, "renamed");
        assert_eq!(subnet.cidr.as_deref(), Some("10.0.0.0/24"));
    }
}
