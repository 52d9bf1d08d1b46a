use anyhow::{Result, anyhow};

use crate::error::GuestbookError;
use crate::helpers::find_similar_id;
use crate::models::{Comment, NewComment};
use crate::store::CommentStore;

pub async fn create(
    name: String,
    instagram: Option<String>,
    twitter: Option<String>,
    facebook: Option<String>,
    text: String,
    store: &CommentStore,
) -> Result<Comment> {
    let input = NewComment {
        name: Some(name),
        instagram,
        twitter,
        facebook,
        comment: Some(text),
    };

    Ok(store.create(input).await?)
}

pub async fn list(store: &CommentStore) -> Result<Vec<Comment>> {
    Ok(store.list().await?)
}

pub async fn like(comment_id: &str, visitor: &str, store: &CommentStore) -> Result<Comment> {
    match store.like(comment_id, visitor).await {
        Err(GuestbookError::NotFound(_)) => {
            let ids = store.database().comment_ids()?;
            let candidates: Vec<&str> = ids.iter().map(String::as_str).collect();

            Err(if let Some(suggestion) = find_similar_id(comment_id, &candidates) {
                anyhow!("Comment not found: {comment_id}\nDid you mean: {suggestion}")
            } else {
                anyhow!("Comment not found: {comment_id}")
            })
        }
        result => Ok(result?),
    }
}
