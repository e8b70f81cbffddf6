//! Sensorlog API Server
//!
//! Run with: cargo run --bin sensorlog
//!
//! Configuration is read from the first config file found
//! (`~/.config/sensorlog/config.toml`, `/etc/sensorlog/config.toml`,
//! `./config.toml`), or from the path given as the first argument, with
//! `SENSORLOG_*` environment variables applied on top. `RUST_LOG` overrides
//! `logging.level`.

use sensorlog::api::{serve, AppState};
use sensorlog::config::{Config, LoggingConfig, StorageBackend};
use sensorlog::storage::{EventRepository, MemoryEventStore, SqliteEventStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_with_env(Path::new(&path))?,
        None => Config::load_default(),
    };
    config.validate()?;

    init_tracing(&config.logging);

    tracing::info!("Starting Sensorlog API server v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config)?;
    tracing::info!(backend = store.backend_name(), "Event store ready");

    let api_config = config.api_config();
    let state = AppState::new(store, api_config.clone(), config.relay_config());

    serve(state, &api_config).await?;

    tracing::info!("Sensorlog API server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("sensorlog={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn EventRepository>, Box<dyn std::error::Error>> {
    let store: Arc<dyn EventRepository> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryEventStore::new()),
        StorageBackend::Sqlite => {
            let data_dir = PathBuf::from(&config.storage.data_dir);
            tracing::info!("Data directory: {:?}", data_dir);
            Arc::new(SqliteEventStore::open(&data_dir)?)
        }
    };
    Ok(store)
}
