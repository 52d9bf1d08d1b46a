#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod helpers;
pub mod id;
pub mod models;
pub mod output;
pub mod server;
pub mod store;

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;

use cli::{Cli, CommentCommands, Commands};
use config::Config;
use crypto::FieldCodec;
use db::Database;
use output::Output;
use store::CommentStore;

pub const NOT_INITIALIZED: &str = "Guestbook not initialized. Run 'gb init' first.";

fn ensure_initialized(data_dir: &Path) -> Result<Database> {
    if !Database::is_initialized(data_dir) {
        bail!(NOT_INITIALIZED);
    }

    Database::open(data_dir).context("Failed to open store")
}

/// Derive the field codec from the configured secret. Key derivation is
/// slow; build this once per process.
pub fn build_codec(config: &Config) -> Result<Arc<FieldCodec>> {
    let codec = FieldCodec::new(config.encryption_secret()?)?;
    Ok(Arc::new(codec))
}

async fn run_comment(comment_cmd: CommentCommands, store: &CommentStore) -> Result<()> {
    match comment_cmd {
        CommentCommands::Create {
            name,
            instagram,
            twitter,
            facebook,
            text,
            json,
        } => {
            let comment =
                commands::comment::create(name, instagram, twitter, facebook, text, store).await?;
            Output::new(json).comment_created(&comment)
        }
        CommentCommands::List { json } => {
            let comments = commands::comment::list(store).await?;
            Output::new(json).comment_list(&comments)
        }
        CommentCommands::Like {
            comment_id,
            visitor,
            json,
        } => {
            let comment = commands::comment::like(&comment_id, &visitor, store).await?;
            Output::new(json).comment_liked(&comment)
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Init { gitignore } => commands::init::run(&config.data_dir, gitignore),
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            commands::serve::run(&config, port).await
        }
        Commands::Comment(comment_cmd) => {
            let db = ensure_initialized(&config.data_dir)?;
            let store = CommentStore::new(db, build_codec(&config)?)
                .with_create_timeout(config.create_timeout);
            run_comment(comment_cmd, &store).await
        }
        Commands::Migrate { json } => {
            let db = ensure_initialized(&config.data_dir)?;
            let report = commands::migrate::run(&db)?;
            Output::new(json).migrated(&report)
        }
    }
}
