//! Agent modules for the Lornu AI Network Engine
//!
//! - `subnet`: OpenStack cloud subnet lifecycle (capabilities, sessions, raw operations, dispatch)
//! - `queue`: task queue contract and the in-process worker pool

pub mod queue;
pub mod subnet;

pub use queue::WorkerPool;
pub use subnet::{SubnetDispatcher, SubnetLifecycle, SubnetTaskRunner};
