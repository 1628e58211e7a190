//! Signalcast Server
//!
//! Hosts the webhook registration API and the event broadcast engine over a
//! relational store. Supports SQLite and PostgreSQL backends.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SC_DB_TYPE` | `sqlite` | Database type: `sqlite`, `postgres` |
//! | `SC_DB_URL` | `sqlite://signalcast.db?mode=rwc` | Database connection URL |
//! | `SC_HTTP_PORT` | `8080` | API listen port |
//! | `SC_REQUEST_TIMEOUT_SECS` | `10` | Per-delivery HTTP timeout |
//! | `SC_FAILURE_THRESHOLD` | `10` | Consecutive failures before auto-disable |
//! | `SC_HISTORY_WINDOW` | `10` | Attempts inspected by the health monitor |
//! | `RUST_LOG` | `info` | Log level |

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sc_api::{create_router, AppState};
use sc_common::EngineConfig;
use sc_engine::{Broadcaster, Dispatcher, HealthMonitor};
use sc_store::{DeliveryLog, SubscriptionStore};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Starting Signalcast Server");

    let config = EngineConfig {
        request_timeout: Duration::from_secs(env_or_parse("SC_REQUEST_TIMEOUT_SECS", 10)),
        failure_threshold: env_or_parse("SC_FAILURE_THRESHOLD", 10),
        history_window: env_or_parse("SC_HISTORY_WINDOW", 10),
        ..EngineConfig::default()
    };
    let http_port: u16 = env_or_parse("SC_HTTP_PORT", 8080);
    let db_type = env_or("SC_DB_TYPE", "sqlite");

    let (store, log) = create_store(&db_type).await?;
    info!("Store initialized ({})", db_type);

    let health = HealthMonitor::new(store.clone(), log.clone(), &config);
    let dispatcher = Arc::new(Dispatcher::new(&config, log.clone(), health)?);
    let broadcaster = Arc::new(Broadcaster::new(store.clone(), dispatcher));

    let state = AppState {
        store,
        log,
        broadcaster,
        config,
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Signalcast Server shutdown complete");
    Ok(())
}

async fn create_store(
    db_type: &str,
) -> Result<(Arc<dyn SubscriptionStore>, Arc<dyn DeliveryLog>)> {
    match db_type {
        "sqlite" => {
            let url = env_or("SC_DB_URL", "sqlite://signalcast.db?mode=rwc");
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            let store = Arc::new(sc_store::sqlite::SqliteStore::new(pool));
            store.init_schema().await?;
            info!("Using SQLite store: {}", url);
            let subscriptions: Arc<dyn SubscriptionStore> = store.clone();
            let log: Arc<dyn DeliveryLog> = store;
            Ok((subscriptions, log))
        }
        "postgres" => {
            let url = std::env::var("SC_DB_URL")
                .map_err(|_| anyhow::anyhow!("SC_DB_URL is required for postgres"))?;
            let pool = PgPoolOptions::new().max_connections(10).connect(&url).await?;
            let store = Arc::new(sc_store::postgres::PostgresStore::new(pool));
            store.init_schema().await?;
            info!("Using PostgreSQL store");
            let subscriptions: Arc<dyn SubscriptionStore> = store.clone();
            let log: Arc<dyn DeliveryLog> = store;
            Ok((subscriptions, log))
        }
        other => Err(anyhow::anyhow!(
            "Unknown database type: {}. Use sqlite or postgres",
            other
        )),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
