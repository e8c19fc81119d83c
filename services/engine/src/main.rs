//! Lornu AI Network Engine
//!
//! Serves the cloud subnet API and runs the ems_operations workers for one
//! OpenStack network manager.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lornu_network_engine::agents::queue::{Route, WorkerPool, DEFAULT_TASK_RETENTION};
use lornu_network_engine::agents::subnet::{
    InMemorySubnetRepository, ManagerRegistry, SubnetDispatcher, SubnetLifecycle,
    SubnetTaskRunner, TracingNotifier, EMS_OPERATIONS_ROLE,
};
use lornu_network_engine::api::{router, AppState};
use lornu_network_engine::config::OpenStackConfig;
use lornu_network_engine::tools::KeystoneManager;

/// Cloud subnet lifecycle service for OpenStack
#[derive(Parser, Debug)]
#[command(name = "subnet-engine", version, about)]
struct Cli {
    /// Address for the HTTP API
    #[arg(long, default_value = "0.0.0.0:8080", env = "SUBNET_ENGINE_LISTEN")]
    listen: SocketAddr,

    /// Workers serving this manager's zone
    #[arg(long, default_value = "2", env = "SUBNET_ENGINE_WORKERS")]
    workers: usize,

    /// Display name of the network manager
    #[arg(long, default_value = "openstack", env = "SUBNET_ENGINE_MANAGER_NAME")]
    manager_name: String,

    /// Capacity of each queue lane
    #[arg(long, default_value = "1000", env = "SUBNET_ENGINE_QUEUE_CAPACITY")]
    queue_capacity: usize,

    /// Finished tasks kept for status queries
    #[arg(long, default_value_t = DEFAULT_TASK_RETENTION, env = "SUBNET_ENGINE_TASK_RETENTION")]
    task_retention: usize,

    #[command(flatten)]
    openstack: OpenStackConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .json()
        .init();

    let cli = Cli::parse();
    info!(
        listen = %cli.listen,
        zone = %cli.openstack.zone,
        workers = cli.workers,
        "Starting Lornu AI Network Engine"
    );

    let zone = cli.openstack.zone.clone();
    let manager = KeystoneManager::new(1, cli.manager_name.clone(), cli.openstack)
        .context("Failed to initialize OpenStack network manager")?;

    let mut managers = ManagerRegistry::new();
    managers.register(Arc::new(manager));

    let subnets = Arc::new(InMemorySubnetRepository::new());
    let lifecycle = SubnetLifecycle::new(Arc::new(TracingNotifier));
    let runner = SubnetTaskRunner::new(lifecycle, subnets.clone(), managers.clone());

    let pool = WorkerPool::with_retention(cli.queue_capacity, cli.task_retention);
    let workers = pool
        .spawn_workers(
            Route::new(zone, EMS_OPERATIONS_ROLE),
            Arc::new(runner),
            cli.workers.max(1),
        )
        .await;

    let state = AppState {
        subnets,
        managers,
        dispatcher: SubnetDispatcher::new(Arc::new(pool.clone())),
        pool: pool.clone(),
    };

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!("Network engine listening on {}", cli.listen);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    pool.shutdown().await;
    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            warn!(error = %e, "Worker ended abnormally");
        }
    }
    info!("Workers drained");
    Ok(())
}
