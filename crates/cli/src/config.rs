//! CLI configuration utilities

use anyhow::{Context, Result};
use skillverse_core::{FileStore, KeyValueStore, Settings};
use skillverse_http::{SessionStore, SkillverseClient};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load settings from defaults, an optional file and the environment
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    Settings::load(path).context("Failed to load settings")
}

/// Open the persistent store and build a session over it
pub fn open_session(settings: &Settings) -> Result<SessionStore> {
    let path = settings.storage_path();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(path.clone())
            .with_context(|| format!("Failed to open store at {}", path.display()))?,
    );
    info!(path = %path.display(), "Using store");

    let client = SkillverseClient::builder_from_settings(settings)
        .user_agent(concat!("skillverse-cli/", env!("CARGO_PKG_VERSION")))
        .store(store)
        .navigator(Arc::new(|| {
            eprintln!("Session expired, run `skillverse login`");
        }))
        .build()
        .context("Failed to build API client")?;

    Ok(SessionStore::new(client))
}
