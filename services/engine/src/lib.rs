//! Lornu AI Network Engine Library
//!
//! OpenStack cloud subnet lifecycle, run through zone-routed queue workers.

pub mod agents;
pub mod api;
pub mod config;
pub mod tools;

pub use agents::queue::{Scheduler, TaskHandle, TaskState, WorkerPool};
pub use agents::subnet::{CloudSubnet, LifecycleAction, SubnetDispatcher, SubnetError};
pub use tools::KeystoneManager;
