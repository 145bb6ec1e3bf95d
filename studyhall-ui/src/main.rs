//! StudyHall UI service - Main entry point
//!
//! Serves the learning portal API: curriculum tree assembly over a
//! swappable remote store, admin content management, flashcards, the
//! session gate and the local profile.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyhall_common::config::{self, BackendKind};
use studyhall_common::profile::ProfileStore;
use studyhall_common::store::memory::MemoryStore;
use studyhall_common::store::sqlite::SqliteStore;
use studyhall_common::store::RemoteStore;
use studyhall_ui::api::{self, AppContext};
use studyhall_ui::auth::AuthGate;
use studyhall_ui::state::{ProfileState, SharedState};

/// Command-line arguments for studyhall-ui
#[derive(Parser, Debug)]
#[command(name = "studyhall-ui")]
#[command(about = "Learning portal service for StudyHall")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "STUDYHALL_PORT")]
    port: Option<u16>,

    /// Folder holding the database and profile snapshot
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Store backend: "sqlite" or "memory"
    #[arg(short, long, env = "STUDYHALL_BACKEND")]
    backend: Option<String>,

    /// Serve the bundled dataset when the remote read fails
    #[arg(long, env = "STUDYHALL_FALLBACK_TO_BUNDLED")]
    fallback_to_bundled: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyhall_ui=debug,studyhall_common=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let toml_config = config::load_toml_config().context("Failed to load config file")?;

    let port = args.port.or(toml_config.port).unwrap_or(5780);
    let data_folder = config::resolve_data_folder(
        args.data_folder.as_deref(),
        "STUDYHALL_DATA_FOLDER",
        &toml_config,
    );
    let backend = match &args.backend {
        Some(s) => BackendKind::parse(s).context("Bad --backend value")?,
        None => toml_config.backend.unwrap_or_default(),
    };
    let fallback_to_bundled = args.fallback_to_bundled
        || toml_config.fallback_to_bundled.unwrap_or(false);

    info!("Starting StudyHall UI on port {}", port);
    info!("Data folder: {}", data_folder.display());

    // Select the remote store backend
    let store: Arc<dyn RemoteStore> = match backend {
        BackendKind::Sqlite => {
            let db_path = data_folder.join("studyhall.db");
            info!("Backend: sqlite at {}", db_path.display());
            Arc::new(
                SqliteStore::connect(&db_path)
                    .await
                    .context("Failed to open database")?,
            )
        }
        BackendKind::Memory => {
            info!("Backend: in-memory (no persistence)");
            Arc::new(MemoryStore::new())
        }
    };

    // Local profile snapshot; unreadable snapshots degrade to defaults
    // inside load(), only setup errors abort here
    let profile = Arc::new(
        ProfileState::load(ProfileStore::new(&data_folder))
            .context("Failed to open profile store")?,
    );

    let state = Arc::new(SharedState::new());

    // Session gate: adopt any persisted identity, then track store events
    let gate = Arc::new(AuthGate::new(
        Arc::clone(&store),
        Arc::clone(&profile),
        Arc::clone(&state),
    ));
    gate.start().await;

    // Initial curriculum snapshot
    match state.reload(store.as_ref(), fallback_to_bundled).await {
        Ok(source) => info!("Initial curriculum loaded ({:?})", source),
        Err(e) => warn!("Initial curriculum load failed: {}", e),
    }

    let ctx = AppContext {
        state,
        store,
        gate,
        profile,
        fallback_to_bundled,
    };

    api::run(port, ctx).await.context("HTTP server failed")?;

    info!("StudyHall UI stopped");
    Ok(())
}
