//! Local record store and network manager registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::connection::NetworkManager;
use super::types::CloudSubnet;

/// Persistent store of local subnet records
#[async_trait]
pub trait SubnetRepository: Send + Sync {
    async fn find(&self, id: u64) -> Option<CloudSubnet>;

    async fn all(&self) -> Vec<CloudSubnet>;

    /// Store a new record, assigning its id
    async fn insert(&self, subnet: CloudSubnet) -> CloudSubnet;

    /// Replace an existing record. Returns `false` if it no longer exists.
    async fn save(&self, subnet: &CloudSubnet) -> bool;

    async fn remove(&self, id: u64) -> Option<CloudSubnet>;
}

#[derive(Default)]
pub struct InMemorySubnetRepository {
    records: RwLock<BTreeMap<u64, CloudSubnet>>,
    next_id: AtomicU64,
}

impl InMemorySubnetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubnetRepository for InMemorySubnetRepository {
    async fn find(&self, id: u64) -> Option<CloudSubnet> {
        self.records.read().await.get(&id).cloned()
    }

    async fn all(&self) -> Vec<CloudSubnet> {
        self.records.read().await.values().cloned().collect()
    }

    async fn insert(&self, mut subnet: CloudSubnet) -> CloudSubnet {
        subnet.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.write().await.insert(subnet.id, subnet.clone());
        subnet
    }

    async fn save(&self, subnet: &CloudSubnet) -> bool {
        match self.records.write().await.get_mut(&subnet.id) {
            Some(existing) => {
                *existing = subnet.clone();
                true
            }
            None => false,
        }
    }

    async fn remove(&self, id: u64) -> Option<CloudSubnet> {
        self.records.write().await.remove(&id)
    }
}

/// Network managers known to this process, by id
#[derive(Clone, Default)]
pub struct ManagerRegistry {
    managers: HashMap<u64, Arc<dyn NetworkManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, manager: Arc<dyn NetworkManager>) {
        self.managers.insert(manager.id(), manager);
    }

    pub fn get(&self, id: u64) -> Option<Arc<dyn NetworkManager>> {
        self.managers.get(&id).cloned()
    }
}
