//! Process wiring for `serve`, `worker` and `sign`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskhook_api::{
    serve, ActorResolver, AppState, RemoteActorResolver, StaticActorResolver,
};
use taskhook_foundation::{
    parse_sqlite_url, ServiceConfig, SqliteLocation, TaskSigner, TaskStore,
};
use taskhook_provider::OllamaClient;
use taskhook_task::{
    broker::is_in_process, open_broker, Broker, CallbackClient, CallbackHooks, HandlerRegistry,
    TaskDispatcher, TaskLifecycle, TaskService, Worker,
};
use tracing::{info, warn};

/// Timeout for the users service token lookup
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServiceConfig> {
    let config = ServiceConfig::load(path)?;
    Ok(config)
}

/// A broker that only this process can see; nothing outside can drain it
pub fn broker_is_local(url: &str) -> bool {
    is_in_process(url) || matches!(parse_sqlite_url(url), Ok(SqliteLocation::Memory))
}

/// API server, optionally with a worker in the same process
pub async fn run_serve(config: ServiceConfig, embedded_worker: bool) -> anyhow::Result<()> {
    let store = TaskStore::open_url(&config.api.database_url)?;
    let broker = open_broker(&config.broker_url)?;
    let signer = Arc::new(TaskSigner::from_config(&config.signature)?);

    let auth: Arc<dyn ActorResolver> = match &config.api.user_auth_url {
        Some(url) => Arc::new(RemoteActorResolver::new(url.clone(), AUTH_TIMEOUT)?),
        None => {
            warn!("USER_AUTH_URL is not set; every bearer token will be rejected");
            Arc::new(StaticActorResolver::new())
        }
    };
    let health = Arc::new(OllamaClient::from_config(&config.llm)?);

    let service = TaskService::new(store, TaskDispatcher::new(broker.clone()));
    let state = Arc::new(AppState::new(service, signer.clone(), auth, health));

    let run_worker = embedded_worker || broker_is_local(&config.broker_url);
    if run_worker {
        info!(broker = broker.name(), "Starting embedded worker");
        let worker = build_worker(&config, broker, signer)?;
        let worker_handle = tokio::spawn(async move { worker.run(shutdown_signal()).await });

        serve(&config.api.bind_addr, state, shutdown_signal()).await?;
        worker_handle.await??;
    } else {
        serve(&config.api.bind_addr, state, shutdown_signal()).await?;
    }

    Ok(())
}

/// Standalone worker; talks to the API only through signed callbacks
pub async fn run_worker(config: ServiceConfig) -> anyhow::Result<()> {
    if broker_is_local(&config.broker_url) {
        anyhow::bail!(
            "BROKER_URL {} is private to this process; run `taskhook serve` instead",
            config.broker_url
        );
    }

    let broker = open_broker(&config.broker_url)?;
    let signer = Arc::new(TaskSigner::from_config(&config.signature)?);
    let worker = build_worker(&config, broker, signer)?;

    info!(
        callback_url = %config.worker.callback_url,
        concurrency = config.worker.concurrency,
        "Starting worker"
    );
    worker.run(shutdown_signal()).await?;
    Ok(())
}

/// Signature a worker would send for `task_id` (and `body` under body scope)
pub fn sign(config: &ServiceConfig, task_id: &str, body: Option<&str>) -> anyhow::Result<String> {
    let signer = TaskSigner::from_config(&config.signature)?;
    Ok(signer.sign_callback(task_id, body.unwrap_or_default().as_bytes()))
}

fn build_worker(
    config: &ServiceConfig,
    broker: Arc<dyn Broker>,
    signer: Arc<TaskSigner>,
) -> anyhow::Result<Worker<CallbackHooks>> {
    let registry = HandlerRegistry::from_config(config)?;
    let client = CallbackClient::from_config(&config.worker, signer)?;
    let lifecycle = TaskLifecycle::new(CallbackHooks::new(client), config.retry);

    Ok(Worker::new(broker, registry, lifecycle, &config.worker))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
