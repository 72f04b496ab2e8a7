use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytegrader_api::state::AppState;
use bytegrader_core::{
    Config, ContainerEngine, Dispatcher, Janitor, JobStore, Queue, RateLimiter, Registry,
    Workspace,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration, refusing to start");
        anyhow::bail!("configuration error: {e}");
    }
    let config = Arc::new(config);

    let engine = Arc::new(ContainerEngine::connect().map_err(|e| {
        tracing::error!(error = %e, "container engine unreachable at startup");
        e
    })?);
    engine.ping().await.map_err(|e| {
        tracing::error!(error = %e, "container engine did not respond to ping");
        e
    })?;

    let store = JobStore::new();
    let queue = Queue::new(config.queue_buffer_size);
    let registry = Registry::new(config.grader_registry_path.clone());
    let workspace = Workspace::new(config.workspace_root.clone());
    let rate_limiter = RateLimiter::new(
        config.rate_limit_enabled,
        config.rate_limit_requests,
        config.rate_limit_window_min,
    );

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        workspace.clone(),
        registry.clone(),
        engine.clone(),
        config.grading_timeout(),
        "bytegrader-workspace",
    ));
    bytegrader_core::worker::spawn_worker_pool(queue.clone(), dispatcher, config.max_concurrent_jobs);

    let janitor = Arc::new(Janitor::new(store.clone(), workspace.clone(), &config));
    bytegrader_core::janitor::spawn(janitor, config.cleanup_interval_hours);

    spawn_rate_limiter_gc(rate_limiter.clone());

    let state = AppState {
        config: config.clone(),
        store,
        queue,
        registry,
        workspace,
        rate_limiter,
        started_at: chrono::Utc::now(),
    };

    let app = bytegrader_api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(bind_address = %addr, version = env!("CARGO_PKG_VERSION"), "bytegrader api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn spawn_rate_limiter_gc(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.sweep_idle();
            tracing::info!("rate limiter idle buckets swept");
        }
    })
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
