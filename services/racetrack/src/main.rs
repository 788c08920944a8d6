use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snailrace::{MemoryStore, MemoryWallet, RedisStore, SnailRace, Store};

mod config;
mod observer;

use config::Config;
use observer::LogBroadcaster;

#[tokio::main]
async fn main() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "racetrack=info,snailrace=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "racetrack",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting racetrack service"
    );

    let config = Config::load()?;
    tracing::info!(
        tick_ms = config.engine.tick_ms,
        join_seconds = config.engine.join_seconds,
        betting_seconds = config.engine.betting_seconds,
        punter_pool = config.engine.punters.pool_size,
        "Configuration loaded"
    );

    let store: Arc<dyn Store> = match &config.redis.url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            tracing::info!("Redis store connected");
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, races will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let wallet = Arc::new(MemoryWallet::new());

    let engine = SnailRace::load(store, wallet, config.engine.clone()).await?;
    tracing::info!("Race engine ready");

    let cancel = CancellationToken::new();
    let sweeper_handle = engine.start_sweeper(cancel.child_token());
    let scheduler_handle = engine.start_scheduler(
        Arc::new(LogBroadcaster::new(config.house_channel.clone())),
        cancel.child_token(),
    );
    let metrics_handle = tokio::spawn(start_metrics_server(config.metrics_port));

    tracing::info!("Racetrack running");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    engine.shutdown_token().cancel();

    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "Sweeper task failed");
    }
    metrics_handle.abort();

    tracing::info!("Racetrack stopped");

    Ok(())
}

async fn start_metrics_server(port: u16) -> Result<()> {
    use axum::{routing::get, Router};
    use std::net::SocketAddr;

    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    let app = Router::new()
        .route("/metrics", get(|| async move { handle.render() }))
        .route("/health", get(|| async { "ok" }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Racetrack metrics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
