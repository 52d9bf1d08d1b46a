use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::db::Database;

pub fn run(data_dir: &Path, gitignore: bool) -> Result<()> {
    if Database::is_initialized(data_dir) {
        println!("Guestbook already initialized in {}", data_dir.display());
        return Ok(());
    }

    Database::init(data_dir).context("Failed to create guestbook store")?;

    if gitignore {
        add_to_gitignore(data_dir)?;
    }

    println!("Initialized guestbook in {}", data_dir.display());
    Ok(())
}

/// Adds the store directory to git exclusions.
/// Prefers `.git/info/exclude` if it exists (truly local), otherwise uses `.gitignore`.
fn add_to_gitignore(data_dir: &Path) -> Result<()> {
    let exclude_path = Path::new(".git/info/exclude");
    let gitignore_path = Path::new(".gitignore");

    // Ciphertext is still personal data; only relative stores can be excluded.
    let Some(entry) = data_dir.to_str().filter(|_| data_dir.is_relative()) else {
        return Ok(());
    };
    let entry = entry.trim_start_matches("./").trim_end_matches('/');

    let target_path = if exclude_path.exists() {
        exclude_path
    } else if gitignore_path.exists() || Path::new(".git").is_dir() {
        gitignore_path
    } else {
        // Not a git repo, skip
        return Ok(());
    };

    let content = fs::read_to_string(target_path).unwrap_or_default();
    if content
        .lines()
        .any(|line| line.trim().trim_end_matches('/') == entry)
    {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(target_path)
        .context("Failed to open git exclusion file")?;

    if !content.is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }

    writeln!(file, "{entry}")?;
    println!("Added {entry} to {}", target_path.display());

    Ok(())
}
