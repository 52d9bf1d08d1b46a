use std::time::Duration;

use serde::Serialize;
use strum::AsRefStr;
use thiserror::Error;

use crate::crypto::DecryptionError;

/// Stable, machine-readable category attached to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    AlreadyLiked,
    Timeout,
    DecryptionError,
    PersistenceError,
}

#[derive(Debug, Error)]
pub enum GuestbookError {
    #[error("{0}")]
    Validation(String),

    #[error("Comment not found: {0}")]
    NotFound(String),

    #[error("Already liked this comment")]
    AlreadyLiked,

    #[error("Store did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Failed to decrypt {field} of comment {id}: {source}")]
    Decryption {
        id: String,
        field: &'static str,
        #[source]
        source: DecryptionError,
    },

    #[error("Store failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl GuestbookError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyLiked => ErrorCode::AlreadyLiked,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Decryption { .. } => ErrorCode::DecryptionError,
            Self::Persistence(_) => ErrorCode::PersistenceError,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Persistence(_))
    }
}

pub type Result<T, E = GuestbookError> = std::result::Result<T, E>;
