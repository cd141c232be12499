//! API server entry point.

use std::sync::Arc;

use api::auth::AuthTokens;
use api::config::{Config, LogFormat};
use inventory::{AvailabilityPublisher, LoggingPublisher};
use stock_store::{InMemoryStore, PostgresStore, StockStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(feature = "redis")]
async fn build_publisher(config: &Config) -> Result<Arc<dyn AvailabilityPublisher>, BoxError> {
    if let Some(url) = &config.redis_url {
        let publisher =
            inventory::RedisPublisher::connect(url, config.availability_channel.clone()).await?;
        tracing::info!(channel = %config.availability_channel, "publishing availability to redis");
        return Ok(Arc::new(publisher));
    }
    Ok(Arc::new(LoggingPublisher::new(
        config.availability_channel.clone(),
    )))
}

#[cfg(not(feature = "redis"))]
async fn build_publisher(config: &Config) -> Result<Arc<dyn AvailabilityPublisher>, BoxError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled; logging availability");
    }
    Ok(Arc::new(LoggingPublisher::new(
        config.availability_channel.clone(),
    )))
}

async fn serve<S: StockStore>(
    config: &Config,
    store: S,
    publisher: Arc<dyn AvailabilityPublisher>,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Result<(), BoxError> {
    let state = api::create_state(store, publisher);
    let tokens = AuthTokens {
        internal: config.internal_auth_token.clone(),
        admin: config.admin_auth_token.clone(),
    };
    let app = api::create_app(state, tokens, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Build the availability sink
    let publisher = build_publisher(&config).await?;

    // 4. Pick the store and start serving
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(
                url,
                config.database_max_connections,
                config.lock_timeout(),
            )
            .await?;
            store.run_migrations().await?;
            serve(&config, store, publisher, metrics_handle).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let store = InMemoryStore::with_lock_timeout(config.lock_timeout());
            serve(&config, store, publisher, metrics_handle).await?;
        }
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}
