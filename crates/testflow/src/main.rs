use std::sync::Arc;

use testflow::api::{self, ApiState};
use testflow::config::{self, StoreKind};
use testflow::db;
use testflow::jobs::{JobStore, LeaseReaper, MemoryJobStore, PgJobStore, QueueCoordinator};
use testflow::liveness::LivenessTracker;
use testflow::scheduler::ScheduleTrigger;
use testflow::shutdown::install_shutdown_handler;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::Config::from_env()?;
    let opts = cfg.queue_options();
    let store_kind = match cfg.store {
        StoreKind::Postgres { .. } => "postgres",
        StoreKind::Memory => "memory",
    };

    tracing::info!(
        listen = %cfg.listen_addr,
        store = store_kind,
        schedule = cfg.schedule.as_deref().unwrap_or("disabled"),
        lease_seconds = cfg.lease_seconds,
        strict_transitions = cfg.strict_transitions,
        liveness_secs = cfg.liveness_threshold_secs,
        "testflow starting"
    );

    let store: Arc<dyn JobStore> = match &cfg.store {
        StoreKind::Postgres { database_url } => {
            let pool = db::make_pool(database_url).await?;
            if cfg.migrate_on_startup {
                db::run_migrations(&pool).await?;
            }
            Arc::new(PgJobStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory job store; queued jobs do not survive a restart");
            Arc::new(MemoryJobStore::new())
        }
    };

    let queue = QueueCoordinator::new(store, opts.clone());
    let liveness = Arc::new(LivenessTracker::new(chrono::Duration::seconds(
        cfg.liveness_threshold_secs,
    )));
    let shutdown = install_shutdown_handler()?;

    let mut tasks = tokio::task::JoinSet::new();

    // ---- Scheduler task ----
    match &cfg.schedule {
        Some(expr) => {
            let trigger = ScheduleTrigger::new(queue.clone(), expr)?;
            tasks.spawn(trigger.run(shutdown.clone()));
        }
        None => tracing::info!("scheduler disabled"),
    }

    // ---- Lease reaper task ----
    if opts.lease.is_some() {
        let reaper = LeaseReaper::new(queue.clone(), cfg.reap_interval());
        tasks.spawn(reaper.run(shutdown.clone()));
    }

    // ---- API ----
    let app = api::app(ApiState { queue, liveness }, &cfg.allowed_origin)?;
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!(addr = %cfg.listen_addr, "api listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    // server exited on its own (or on signal); stop the background tasks too
    shutdown.cancel();
    while let Some(res) = tasks.join_next().await {
        res?;
    }

    tracing::info!("testflow stopped");
    Ok(())
}
