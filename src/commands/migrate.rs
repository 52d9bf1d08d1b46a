use anyhow::{Context, Result};
use tracing::info;

use crate::db::{BackfillReport, Database};

/// Give every comment a `likes` count and `liked_by` list, deduplicating
/// visitors and recomputing the count from the list.
pub fn run(db: &Database) -> Result<BackfillReport> {
    let report = db
        .backfill_likes()
        .context("Failed to backfill like counts")?;
    info!(
        scanned = report.scanned,
        updated = report.updated,
        "Like backfill finished"
    );
    Ok(report)
}
