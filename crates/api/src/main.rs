use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aiq_api::config::{load_providers, ServerConfig};
use aiq_api::keys::ApiKeyStore;
use aiq_api::router::build_app_router;
use aiq_api::state::AppState;
use aiq_engine::{JobQueue, JobStore, ProviderRegistry, ProviderRouter, WorkerPool};
use aiq_events::{EventBus, ReplyToNotifier, WebhookDelivery};
use aiq_providers::{HttpProviderClient, ProviderClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aiq_api=debug,aiq_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        workers = config.dispatch.worker_count,
        max_attempts = config.dispatch.max_attempts,
        "Loaded server configuration"
    );

    // --- Providers ---
    let descriptors = match &config.providers_path {
        Some(path) => load_providers(path),
        None => Vec::new(),
    };
    tracing::info!(count = descriptors.len(), "Provider descriptors loaded");

    // --- Engine ---
    // Subscribe before any job can be submitted so no event is missed.
    let events = EventBus::default();
    let notifications = events.subscribe();

    let store = Arc::new(JobStore::new(events));
    let queue = Arc::new(JobQueue::new(Arc::clone(&store)));
    let registry =
        Arc::new(ProviderRegistry::new(descriptors).expect("Invalid provider configuration"));
    let provider_router = Arc::new(ProviderRouter::new(Arc::clone(&registry)));
    let client: Arc<dyn ProviderClient> = Arc::new(HttpProviderClient::new(Duration::from_secs(
        config.provider_timeout_secs,
    )));

    let workers = WorkerPool::start(
        Arc::clone(&store),
        Arc::clone(&queue),
        provider_router,
        client,
        config.dispatch.clone(),
    )
    .await
    .expect("Failed to start worker pool");

    // --- Reply-to notifier ---
    let delivery = WebhookDelivery::new(config.webhook_signing_secret.clone());
    let notifier_handle = tokio::spawn(ReplyToNotifier::new(delivery).run(notifications));
    tracing::info!("Reply-to notifier started");

    // --- App state ---
    let state = AppState {
        store: Arc::clone(&store),
        queue: Arc::clone(&queue),
        registry,
        workers: Arc::clone(&workers),
        api_keys: Arc::new(ApiKeyStore::new()),
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining the engine");

    // Drain workers first; they may have in-flight generations.
    workers.shutdown().await;
    tracing::info!("Worker pool drained");

    // Drop the engine handles to close the event bus. This signals the
    // reply-to notifier to shut down.
    drop(workers);
    drop(queue);
    drop(store);
    let _ = tokio::time::timeout(Duration::from_secs(5), notifier_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Resolve when SIGINT (Ctrl-C) or, on Unix, SIGTERM arrives. Either signal
/// starts the graceful shutdown, whether the server runs interactively or
/// under a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("SIGINT received, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("SIGTERM received, starting graceful shutdown");
        }
    }
}
