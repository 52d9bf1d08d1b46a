//! The guestbook core: create, list and like, with encryption applied at
//! the store boundary.
//!
//! File I/O runs on the blocking pool; validation and encryption run inline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use jiff::Timestamp;
use tokio::task;
use tracing::{error, info, warn};

use crate::crypto::FieldCodec;
use crate::db::{Database, LikeOutcome};
use crate::error::{GuestbookError, Result};
use crate::id::generate_id;
use crate::models::{Comment, NewComment, StoredComment};

pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct CommentStore {
    db: Arc<Database>,
    codec: Arc<FieldCodec>,
    create_timeout: Duration,
}

impl CommentStore {
    pub fn new(db: Database, codec: Arc<FieldCodec>) -> Self {
        Self {
            db: Arc::new(db),
            codec,
            create_timeout: DEFAULT_CREATE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run a store call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| GuestbookError::Persistence(e.into()))?
            .map_err(GuestbookError::Persistence)
    }

    fn open(&self, stored: &StoredComment) -> Result<Comment> {
        stored.open(&self.codec).inspect_err(|e| {
            error!(comment_id = %stored.id, error = %e, "Stored comment failed to decrypt");
        })
    }

    pub async fn create(&self, input: NewComment) -> Result<Comment> {
        let input = input.validate()?;
        let stored = StoredComment::seal(generate_id(), &input, &self.codec, Timestamp::now());

        let cancelled = Arc::new(AtomicBool::new(false));
        let write = {
            let stored = stored.clone();
            let cancelled = Arc::clone(&cancelled);
            self.blocking(move |db| db.create_comment(&stored, &cancelled))
        };

        match tokio::time::timeout(self.create_timeout, write).await {
            // The cancel flag is only raised once this future is dropped, so a
            // completed write always reports `true`.
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(error = %e, "Failed to persist comment");
                return Err(e);
            }
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                warn!(
                    comment_id = %stored.id,
                    timeout = ?self.create_timeout,
                    "Comment create timed out"
                );
                return Err(GuestbookError::Timeout(self.create_timeout));
            }
        }

        info!(comment_id = %stored.id, "Created comment");
        self.open(&stored)
    }

    /// Every comment, newest first. One undecryptable record fails the
    /// whole listing.
    pub async fn list(&self) -> Result<Vec<Comment>> {
        let stored = self.blocking(Database::list_comments).await.inspect_err(|e| {
            error!(error = %e, "Failed to list comments");
        })?;

        stored.iter().map(|c| self.open(c)).collect()
    }

    pub async fn like(&self, comment_id: &str, visitor_id: &str) -> Result<Comment> {
        if visitor_id.trim().is_empty() {
            return Err(GuestbookError::validation("Visitor identifier is required"));
        }

        let outcome = {
            let id = comment_id.to_owned();
            let visitor = visitor_id.to_owned();
            self.blocking(move |db| db.like_comment(&id, &visitor, Timestamp::now()))
                .await
                .inspect_err(|e| error!(comment_id, error = %e, "Failed to like comment"))?
        };

        match outcome {
            LikeOutcome::Liked(stored) => {
                info!(comment_id, likes = stored.likes, "Liked comment");
                self.open(&stored)
            }
            LikeOutcome::AlreadyLiked => Err(GuestbookError::AlreadyLiked),
            LikeOutcome::NotFound => Err(GuestbookError::NotFound(comment_id.to_owned())),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.blocking(Database::ping).await
    }
}
