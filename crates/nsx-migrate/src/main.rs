//! nsx-migrate - legacy binding schema migration tool
//!
//! Migrates pre-segment networks and legacy port bindings to the
//! segment-based schema. Aborts with no changes when the free-VNI pool is
//! smaller than the set of networks needing one.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use nsx_migrate::{Migration, RedisSchemaDb};
use nsxsync_common::SyncError;

#[derive(Parser, Debug)]
#[command(name = "nsx-migrate")]
#[command(about = "Migrate legacy NSX bindings to the segment-based schema", long_about = None)]
struct Args {
    /// The connection url for the target db
    connection: String,

    /// Conduct a dry-run: render every write instead of executing it
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    let db = match RedisSchemaDb::connect(&args.connection).await {
        Ok(db) => db,
        Err(e) => {
            error!("Could not connect to {}: {}", args.connection, e);
            return ExitCode::FAILURE;
        }
    };

    let mut migration = Migration::new(&db, args.dry_run);
    match migration.run().await {
        Ok(()) => {
            if args.dry_run {
                info!(
                    "Dry run complete, {} writes rendered",
                    migration.rendered_writes().len()
                );
            } else {
                info!("Migration complete");
            }
            ExitCode::SUCCESS
        }
        Err(e @ SyncError::InsufficientVnis { .. }) => {
            error!("{}. No changes were made.", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Migration failed");
            ExitCode::FAILURE
        }
    }
}
