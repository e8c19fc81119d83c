//! Test doubles shared by the subnet and api tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::agents::queue::{QueueError, QueueItem, Scheduler, TaskHandle, TaskOptions, TaskState};

use super::connection::{ConnectionOptions, NetworkManager, NetworkSession};
use super::error::ProviderError;
use super::notification::{Notification, Notifier};
use super::types::{ProviderSubnet, SubnetOptions};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    Create(SubnetOptions),
    Update(String, SubnetOptions),
    Delete(String),
}

#[derive(Default)]
struct FakeState {
    opened: usize,
    released: usize,
    calls: Vec<SessionCall>,
    connection_options: Vec<ConnectionOptions>,
    failure: Option<(u16, String)>,
}

/// Network manager whose sessions record calls instead of reaching a provider
pub struct FakeManager {
    zone: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeManager {
    pub const REFERENCE: &'static str = "abc-123";

    pub fn new(zone: &str) -> Arc<Self> {
        Arc::new(Self {
            zone: zone.to_string(),
            state: Arc::new(Mutex::new(FakeState::default())),
        })
    }

    pub fn as_dyn(&self) -> &dyn NetworkManager {
        self
    }

    /// Every following provider call fails with this response
    pub fn fail_with(&self, status: u16, body: &str) {
        self.state.lock().unwrap().failure = Some((status, body.to_string()));
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn connection_options(&self) -> Vec<ConnectionOptions> {
        self.state.lock().unwrap().connection_options.clone()
    }
}

#[async_trait]
impl NetworkManager for FakeManager {
    fn id(&self) -> u64 {
        1
    }

    fn name(&self) -> &str {
        "fake-openstack"
    }

    fn zone(&self) -> String {
        self.zone.clone()
    }

    async fn open_session(
        &self,
        options: &ConnectionOptions,
    ) -> Result<Box<dyn NetworkSession>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.opened += 1;
        state.connection_options.push(options.clone());
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    fn record(&self, call: SessionCall) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match &state.failure {
            Some((status, body)) => Err(ProviderError::Response {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NetworkSession for FakeSession {
    async fn create_subnet(&self, options: &SubnetOptions) -> Result<ProviderSubnet, ProviderError> {
        self.record(SessionCall::Create(options.clone()))?;
        Ok(ProviderSubnet {
            id: FakeManager::REFERENCE.to_string(),
            name: options
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            cidr: options.get("cidr").and_then(|v| v.as_str()).map(str::to_string),
            network_id: None,
        })
    }

    async fn update_subnet(&self, ems_ref: &str, options: &SubnetOptions) -> Result<(), ProviderError> {
        self.record(SessionCall::Update(ems_ref.to_string(), options.clone()))
    }

    async fn delete_subnet(&self, ems_ref: &str) -> Result<(), ProviderError> {
        self.record(SessionCall::Delete(ems_ref.to_string()))
    }

    fn release(&mut self) {
        self.state.lock().unwrap().released += 1;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Scheduler that keeps submissions instead of running them
#[derive(Default)]
pub struct RecordingScheduler {
    submitted: Mutex<Vec<(TaskOptions, QueueItem)>>,
    states: Mutex<Vec<watch::Sender<TaskState>>>,
}

impl RecordingScheduler {
    pub fn submitted(&self) -> Vec<(TaskOptions, QueueItem)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn submit(&self, task: TaskOptions, item: QueueItem) -> Result<TaskHandle, QueueError> {
        let (state_tx, state_rx) = watch::channel(TaskState::Queued);
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((task, item));
        let task_id = format!("task-{}", submitted.len());
        self.states.lock().unwrap().push(state_tx);
        Ok(TaskHandle::new(task_id, state_rx))
    }
}
