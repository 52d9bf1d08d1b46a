use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gb")]
#[command(about = "Encrypted guestbook with per-visitor likes", long_about = None)]
pub struct Cli {
    /// Store directory (overrides GUESTBOOK_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the guestbook store
    Init {
        /// Keep the store out of git (adds it to .git/info/exclude or .gitignore)
        #[arg(long)]
        gitignore: bool,
    },

    /// Serve the guestbook HTTP API
    Serve {
        /// Port to listen on (overrides GUESTBOOK_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage comments
    #[command(subcommand)]
    Comment(CommentCommands),

    /// Backfill like counts on comments written before likes existed
    Migrate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CommentCommands {
    /// Leave a comment in the guestbook
    Create {
        /// Who is signing
        #[arg(long)]
        name: String,

        /// Instagram handle
        #[arg(long)]
        instagram: Option<String>,

        /// Twitter handle
        #[arg(long)]
        twitter: Option<String>,

        /// Facebook handle
        #[arg(long)]
        facebook: Option<String>,

        /// The comment text
        #[arg(long)]
        text: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all comments, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Like a comment
    Like {
        /// The comment ID to like
        #[arg(allow_hyphen_values = true)]
        comment_id: String,

        /// Visitor identifier used to deduplicate likes
        #[arg(long, default_value = "cli")]
        visitor: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
