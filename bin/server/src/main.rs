use leadflow_adapters::adapter::{AdapterSet, HttpCaller};
use leadflow_adapters::http::ReqwestHttpCaller;
use leadflow_engine::engine::ExecutionEngine;
use leadflow_engine::nats::{NatsExecutionQueue, NatsQueueConfig};
use leadflow_engine::queue::{ExecutionQueue, TokioExecutionQueue};
use leadflow_engine::store::{ExecutionStore, WorkflowStore};
use leadflow_scheduler::Sweeper;
use leadflow_server::config::ServerConfig;
use leadflow_server::db::{PgExecutionStore, PgWorkflowStore};
use leadflow_server::gateway::GatewayAdapters;
use leadflow_server::state::AppState;
use leadflow_server::api;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    let workflows: Arc<dyn WorkflowStore> = Arc::new(PgWorkflowStore::new(db_pool.clone()));
    let executions: Arc<dyn ExecutionStore> = Arc::new(PgExecutionStore::new(db_pool));

    // Adapters: workflow HTTP nodes call out directly; message/CRM/email/SMS
    // delivery goes through the channel gateway.
    let http_caller: Arc<dyn HttpCaller> = Arc::new(ReqwestHttpCaller::new());
    let gateway = Arc::new(GatewayAdapters::new(&config.gateway_url, http_caller.clone()));
    let adapters = AdapterSet::new(
        gateway.clone(),
        gateway.clone(),
        http_caller,
        gateway.clone(),
        gateway,
    );

    let limits = config.engine.limits();
    let engine = ExecutionEngine::new(executions.clone(), adapters).with_limits(limits);

    // Execution queue: NATS when configured, in-process tasks otherwise.
    let queue: Arc<dyn ExecutionQueue> = match &config.nats {
        Some(nats) => {
            let nats_queue = Arc::new(
                NatsExecutionQueue::connect(NatsQueueConfig::new(&nats.url))
                    .await
                    .expect("failed to connect to NATS"),
            );
            let worker_queue = nats_queue.clone();
            let worker_engine = engine.clone();
            tokio::spawn(async move {
                if let Err(e) = worker_queue.run_worker(worker_engine).await {
                    tracing::error!(error = %e, "execution worker stopped");
                }
            });
            tracing::info!(url = %nats.url, "using NATS execution queue");
            nats_queue
        }
        None => {
            tracing::info!("using in-process execution queue");
            Arc::new(TokioExecutionQueue::new(engine.clone()))
        }
    };

    let pending_ttl = chrono::Duration::hours(config.sweep.pending_ttl_hours);
    let state = Arc::new(AppState::new(
        workflows,
        executions.clone(),
        engine,
        queue.clone(),
        limits,
        pending_ttl,
    ));

    // Spawn the sweep loop: due Wait timers and pending-input expiry.
    let sweeper = Sweeper::new(executions, queue, state.pending.clone());
    let _sweep_task = sweeper.spawn(Duration::from_secs(config.sweep.interval_seconds));

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .await
        .expect("server error");
}
