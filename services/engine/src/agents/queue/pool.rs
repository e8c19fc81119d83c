//! In-process Worker Pool
//!
//! Tasks are routed by zone and role. Each route owns three lanes (high,
//! normal, low) and its workers always drain the highest non-empty lane first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{Priority, QueueItem, Route, TaskOptions, TaskState, TaskStatus};
use super::{QueueError, Scheduler, TaskHandle, TaskRunner};

/// Finished tasks kept for status queries before the oldest are dropped
pub const DEFAULT_TASK_RETENTION: usize = 1000;

struct Job {
    task_id: String,
    item: QueueItem,
}

struct Lanes {
    high: (Sender<Job>, Receiver<Job>),
    normal: (Sender<Job>, Receiver<Job>),
    low: (Sender<Job>, Receiver<Job>),
}

impl Lanes {
    fn new(capacity: usize) -> Self {
        Self {
            high: bounded(capacity),
            normal: bounded(capacity),
            low: bounded(capacity),
        }
    }

    fn sender(&self, priority: Priority) -> &Sender<Job> {
        match priority {
            Priority::High => &self.high.0,
            Priority::Normal => &self.normal.0,
            Priority::Low => &self.low.0,
        }
    }

    /// Next job, highest priority first. `None` once every lane is closed and drained.
    async fn next(&self) -> Option<Job> {
        tokio::select! {
            biased;
            Ok(job) = self.high.1.recv() => Some(job),
            Ok(job) = self.normal.1.recv() => Some(job),
            Ok(job) = self.low.1.recv() => Some(job),
            else => None,
        }
    }

    fn close(&self) {
        self.high.0.close();
        self.normal.0.close();
        self.low.0.close();
    }
}

struct TaskRecord {
    seq: u64,
    status: TaskStatus,
    state_tx: watch::Sender<TaskState>,
}

/// Task records by id. Only `retention` finished records are kept.
struct TaskTable {
    records: HashMap<String, TaskRecord>,
    finished: VecDeque<String>,
    next_seq: u64,
    retention: usize,
}

impl TaskTable {
    fn new(retention: usize) -> Self {
        Self {
            records: HashMap::new(),
            finished: VecDeque::new(),
            next_seq: 0,
            retention,
        }
    }

    fn insert(&mut self, status: TaskStatus, state_tx: watch::Sender<TaskState>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            status.task_id.clone(),
            TaskRecord {
                seq,
                status,
                state_tx,
            },
        );
    }

    fn finish(&mut self, task_id: &str) {
        self.finished.push_back(task_id.to_string());
        while self.finished.len() > self.retention {
            if let Some(evicted) = self.finished.pop_front() {
                self.records.remove(&evicted);
                debug!(task_id = %evicted, "Dropped finished task record");
            }
        }
    }
}

struct PoolInner {
    capacity: usize,
    lanes: RwLock<HashMap<Route, Arc<Lanes>>>,
    tasks: RwLock<TaskTable>,
}

/// Zone/role routed pool of tokio workers
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// `capacity` bounds each lane of each route
    pub fn new(capacity: usize) -> Self {
        Self::with_retention(capacity, DEFAULT_TASK_RETENTION)
    }

    /// Like `new`, keeping at most `retention` finished tasks in the table
    pub fn with_retention(capacity: usize, retention: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity: capacity.max(1),
                lanes: RwLock::new(HashMap::new()),
                tasks: RwLock::new(TaskTable::new(retention)),
            }),
        }
    }

    async fn lanes_for(&self, route: &Route) -> Arc<Lanes> {
        let mut lanes = self.inner.lanes.write().await;
        lanes
            .entry(route.clone())
            .or_insert_with(|| Arc::new(Lanes::new(self.inner.capacity)))
            .clone()
    }

    /// Start `count` workers serving `route`
    pub async fn spawn_workers(
        &self,
        route: Route,
        runner: Arc<dyn TaskRunner>,
        count: usize,
    ) -> Vec<JoinHandle<()>> {
        let lanes = self.lanes_for(&route).await;
        info!(route = %route, workers = count, "Starting workers");

        (0..count)
            .map(|worker| {
                let pool = self.clone();
                let lanes = lanes.clone();
                let runner = runner.clone();
                let route = route.clone();
                tokio::spawn(async move {
                    while let Some(job) = lanes.next().await {
                        pool.process(runner.as_ref(), job).await;
                    }
                    info!(route = %route, worker, "Worker stopped");
                })
            })
            .collect()
    }

    async fn process(&self, runner: &dyn TaskRunner, job: Job) {
        info!(
            task_id = %job.task_id,
            method = %job.item.method_name,
            instance_id = ?job.item.instance_id,
            "Processing task"
        );
        self.transition(&job.task_id, TaskState::Running).await;

        let state = match runner.run(&job.item).await {
            Ok(result) => TaskState::Succeeded { result },
            Err(failure) => {
                warn!(task_id = %job.task_id, error = %failure, "Task failed");
                TaskState::Failed {
                    message: failure.message,
                }
            }
        };
        self.transition(&job.task_id, state).await;
    }

    async fn transition(&self, task_id: &str, state: TaskState) {
        let mut tasks = self.inner.tasks.write().await;
        let Some(record) = tasks.records.get_mut(task_id) else {
            return;
        };
        if record.status.state.is_terminal() {
            return;
        }
        info!(task_id = %task_id, state = state.label(), "Task state changed");
        let terminal = state.is_terminal();
        record.status.state = state.clone();
        record.status.updated_at = Utc::now();
        record.state_tx.send_replace(state);
        if terminal {
            tasks.finish(task_id);
        }
    }

    /// Known tasks in submission order
    pub async fn list_tasks(&self) -> Vec<TaskStatus> {
        let tasks = self.inner.tasks.read().await;
        let mut records: Vec<&TaskRecord> = tasks.records.values().collect();
        records.sort_by_key(|r| r.seq);
        records.into_iter().map(|r| r.status.clone()).collect()
    }

    pub async fn task(&self, task_id: &str) -> Option<TaskStatus> {
        let tasks = self.inner.tasks.read().await;
        tasks.records.get(task_id).map(|r| r.status.clone())
    }

    /// Close every lane. Workers finish the queued jobs and then stop, so
    /// callers should await the handles from `spawn_workers` afterwards.
    pub async fn shutdown(&self) {
        let lanes = self.inner.lanes.read().await;
        for lane in lanes.values() {
            lane.close();
        }
        info!(routes = lanes.len(), "Worker pool shutting down");
    }
}

#[async_trait]
impl Scheduler for WorkerPool {
    /// Never waits for lane space: a full lane is reported as `QueueError::Full`.
    async fn submit(&self, task: TaskOptions, item: QueueItem) -> Result<TaskHandle, QueueError> {
        let route = item.route();
        let lanes = self
            .inner
            .lanes
            .read()
            .await
            .get(&route)
            .cloned()
            .ok_or_else(|| QueueError::NoWorkers {
                zone: route.zone.clone(),
                role: route.role.clone(),
            })?;

        let task_id = Uuid::new_v4().to_string();
        let (state_tx, state_rx) = watch::channel(TaskState::Queued);
        let now = Utc::now();
        let status = TaskStatus {
            task_id: task_id.clone(),
            action: task.action,
            userid: task.userid,
            zone: item.zone.clone(),
            role: item.role.clone(),
            method_name: item.method_name.clone(),
            instance_id: item.instance_id,
            state: TaskState::Queued,
            created_at: now,
            updated_at: now,
        };

        let priority = item.priority;
        let job = Job {
            task_id: task_id.clone(),
            item,
        };

        // Held across the send so a worker cannot pick the job up before its record exists.
        let mut tasks = self.inner.tasks.write().await;
        match lanes.sender(priority).try_send(job) {
            Ok(()) => tasks.insert(status, state_tx),
            Err(TrySendError::Full(_)) => {
                warn!(route = %route, priority = ?priority, "Queue lane full, task rejected");
                return Err(QueueError::Full {
                    zone: route.zone,
                    role: route.role,
                });
            }
            Err(TrySendError::Closed(_)) => {
                return Err(QueueError::Closed {
                    zone: route.zone,
                    role: route.role,
                });
            }
        }
        drop(tasks);

        info!(task_id = %task_id, route = %route, priority = ?priority, "Task queued");
        Ok(TaskHandle::new(task_id, state_rx))
    }
}
