//! nsxsyncd - NSX backend synchronization daemon
//!
//! Entry point. Runs the reconciliation supervisor against the orchestrator
//! database and the NSX backend API. The lifecycle driver itself is invoked
//! by the orchestrator process, which embeds this crate as a library.

use std::env;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nsxsync_common::{MappingStore, NsxBackend, OrchestratorDb, RedisOrchestratorDb, RedisStore};
use nsxsyncd::{NsxApiClient, SyncConfig, SyncSupervisor};

/// Default orchestrator/mapping database URL.
const DEFAULT_DB_URL: &str = "redis://127.0.0.1:6379/0";

/// Default NSX API endpoint.
const DEFAULT_NSX_API_URL: &str = "http://127.0.0.1:8080";

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("--- Starting nsxsyncd ---");

    let config = SyncConfig::from_env();
    config.validate()?;

    let db_url = env::var("NSXSYNC_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string());
    let api_url = env::var("NSX_API_URL").unwrap_or_else(|_| DEFAULT_NSX_API_URL.to_string());

    let backend: Arc<dyn NsxBackend> = Arc::new(NsxApiClient::new(api_url));
    let store: Arc<dyn MappingStore> = Arc::new(RedisStore::connect(&db_url).await?);
    let orchestrator: Arc<dyn OrchestratorDb> =
        Arc::new(RedisOrchestratorDb::connect(&db_url).await?);

    let mut supervisor = SyncSupervisor::new(backend, store, orchestrator, config);

    tokio::select! {
        _ = supervisor.run() => {}
        _ = signal::ctrl_c() => {
            info!("nsxsyncd: shutdown signal received");
        }
    }

    Ok(())
}
