use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::server;
use crate::store::CommentStore;

/// Serve the HTTP API, creating the store on first start.
pub async fn run(config: &Config, port: u16) -> Result<()> {
    info!(config = ?config, "Starting guestbook server");

    let db = if Database::is_initialized(&config.data_dir) {
        Database::open(&config.data_dir)
    } else {
        info!("Creating store in {}", config.data_dir.display());
        Database::init(&config.data_dir)
    }
    .context("Failed to open store")?;

    let store = CommentStore::new(db, crate::build_codec(config)?)
        .with_create_timeout(config.create_timeout);

    server::serve(store, port).await
}
