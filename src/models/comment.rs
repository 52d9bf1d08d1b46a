use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::crypto::{DecryptionError, FieldCodec};
use crate::db::atomic_write;
use crate::error::GuestbookError;

pub const COMMENTS_DIR: &str = "comments";

/// Guestbook form input, exactly as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl NewComment {
    pub fn new(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            comment: Some(comment.into()),
            ..Self::default()
        }
    }

    /// Trim every field and reject blank required fields.
    pub fn validate(self) -> Result<ValidComment, GuestbookError> {
        let name = required(self.name, "Name")?;
        let comment = required(self.comment, "Comment")?;

        Ok(ValidComment {
            name,
            instagram: optional(self.instagram),
            twitter: optional(self.twitter),
            facebook: optional(self.facebook),
            comment,
        })
    }
}

fn required(value: Option<String>, label: &str) -> Result<String, GuestbookError> {
    optional(value).ok_or_else(|| GuestbookError::validation(format!("{label} is required")))
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Trimmed input with both required fields present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidComment {
    pub name: String,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub comment: String,
}

/// The record as it lives on disk; every text field is an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredComment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    pub comment: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    pub created_at: Timestamp,
    #[serde(default = "Timestamp::now")]
    pub updated_at: Timestamp,
}

impl StoredComment {
    pub fn seal(id: String, input: &ValidComment, codec: &FieldCodec, now: Timestamp) -> Self {
        let seal_optional = |v: &Option<String>| v.as_deref().map(|v| codec.encrypt(v));

        Self {
            id,
            name: codec.encrypt(&input.name),
            instagram: seal_optional(&input.instagram),
            twitter: seal_optional(&input.twitter),
            facebook: seal_optional(&input.facebook),
            comment: codec.encrypt(&input.comment),
            likes: 0,
            liked_by: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn open(&self, codec: &FieldCodec) -> Result<Comment, GuestbookError> {
        let field = |name: &'static str, envelope: &str| {
            codec
                .decrypt(envelope)
                .map_err(|source| self.decryption_error(name, source))
        };
        let optional_field = |name: &'static str, envelope: &Option<String>| {
            envelope
                .as_deref()
                .map(|e| field(name, e))
                .transpose()
                .map(|v| v.filter(|v| !v.is_empty()))
        };

        Ok(Comment {
            id: self.id.clone(),
            name: field("name", &self.name)?,
            instagram: optional_field("instagram", &self.instagram)?,
            twitter: optional_field("twitter", &self.twitter)?,
            facebook: optional_field("facebook", &self.facebook)?,
            comment: field("comment", &self.comment)?,
            likes: self.likes,
            liked_by: self.liked_by.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    fn decryption_error(&self, field: &'static str, source: DecryptionError) -> GuestbookError {
        GuestbookError::Decryption {
            id: self.id.clone(),
            field,
            source,
        }
    }

    pub fn has_liked(&self, visitor_id: &str) -> bool {
        self.liked_by.iter().any(|v| v == visitor_id)
    }

    /// Record one like. Callers must hold the record's lock and have checked
    /// [`Self::has_liked`].
    pub fn add_like(&mut self, visitor_id: &str, now: Timestamp) {
        self.liked_by.push(visitor_id.to_owned());
        self.likes += 1;
        self.updated_at = now;
    }

    pub fn file_path(&self, base: &Path) -> PathBuf {
        Self::path_for(base, &self.id)
    }

    pub fn path_for(base: &Path, id: &str) -> PathBuf {
        base.join(COMMENTS_DIR).join(format!("{id}.toml"))
    }

    pub fn write_file(&self, base: &Path) -> Result<()> {
        let path = self.file_path(base);
        let content = toml::to_string(self).context("Failed to serialize comment")?;
        atomic_write(&path, content.as_bytes())
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Decrypted view handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    pub comment: String,
    pub likes: u64,
    pub liked_by: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
