//! File-backed comment store.
//!
//! Layout under the data directory:
//!
//! - `comments/<id>.toml` one record per file, replaced atomically on write
//! - `locks/<id>.lock` per-record lock taken while a like is applied
//! - `store.lock` shared by every writer, exclusive for the backfill
//!
//! Locks are `flock`-style advisory locks, so they serialize threads of this
//! process as well as other processes pointed at the same directory.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use jiff::Timestamp;
use serde::Serialize;

use crate::id::is_valid_id;
use crate::models::{COMMENTS_DIR, StoredComment};

pub const LOCKS_DIR: &str = "locks";
pub const STORE_LOCK_FILE: &str = "store.lock";

/// Atomically write content to a file using a temporary file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp = path.with_extension("toml.tmp");
    let mut file = File::create(&temp)
        .with_context(|| format!("Failed to create temporary file: {}", temp.display()))?;
    file.write_all(content)
        .context("Failed to write file content")?;
    file.sync_all().context("Failed to sync file")?;
    fs::rename(&temp, path).with_context(|| format!("Failed to rename to {}", path.display()))?;
    Ok(())
}

/// A held advisory lock, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Debug)]
pub enum LikeOutcome {
    Liked(StoredComment),
    AlreadyLiked,
    NotFound,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
}

#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open an existing store from the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !Self::is_initialized(&path) {
            bail!("Guestbook store does not exist: {}", path.display());
        }

        Ok(Self { path })
    }

    /// Create the directory layout if missing and open the store.
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        fs::create_dir_all(path.join(COMMENTS_DIR))
            .context("Failed to create comments directory")?;
        fs::create_dir_all(path.join(LOCKS_DIR)).context("Failed to create locks directory")?;

        Self::open(path)
    }

    pub fn is_initialized(path: &Path) -> bool {
        path.join(COMMENTS_DIR).is_dir() && path.join(LOCKS_DIR).is_dir()
    }

    pub fn base_path(&self) -> &Path {
        &self.path
    }

    /// Cheap liveness probe: the comments directory must still be readable.
    pub fn ping(&self) -> Result<()> {
        fs::read_dir(self.path.join(COMMENTS_DIR)).context("Comments directory unreadable")?;
        Ok(())
    }

    fn lock_file(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))
    }

    pub fn lock_shared(&self) -> Result<StoreLock> {
        let file = Self::lock_file(&self.path.join(STORE_LOCK_FILE))?;
        file.lock_shared()
            .context("Failed to acquire shared store lock")?;
        Ok(StoreLock { file })
    }

    pub fn lock_exclusive(&self) -> Result<StoreLock> {
        let file = Self::lock_file(&self.path.join(STORE_LOCK_FILE))?;
        file.lock_exclusive()
            .context("Failed to acquire exclusive store lock")?;
        Ok(StoreLock { file })
    }

    fn lock_record(&self, id: &str) -> Result<StoreLock> {
        let file = Self::lock_file(&self.path.join(LOCKS_DIR).join(format!("{id}.lock")))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock comment {id}"))?;
        Ok(StoreLock { file })
    }

    // Comment operations

    /// Persist a new record unless `cancelled` was raised while waiting for
    /// the store lock. Returns whether the record was written.
    pub fn create_comment(&self, comment: &StoredComment, cancelled: &AtomicBool) -> Result<bool> {
        let _store = self.lock_shared()?;

        if cancelled.load(Ordering::SeqCst) {
            return Ok(false);
        }

        if comment.file_path(&self.path).exists() {
            bail!("Comment already exists: {}", comment.id);
        }

        comment.write_file(&self.path)?;
        Ok(true)
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<StoredComment>> {
        if !is_valid_id(id) {
            return Ok(None);
        }

        let path = StoredComment::path_for(&self.path, id);
        if !path.exists() {
            return Ok(None);
        }

        StoredComment::read_file(&path).map(Some)
    }

    fn comment_paths(&self) -> Result<Vec<PathBuf>> {
        let dir = fs::read_dir(self.path.join(COMMENTS_DIR))
            .context("Failed to read comments directory")?;

        let mut paths = Vec::new();
        for entry in dir {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.extension() != Some(std::ffi::OsStr::new("toml")) {
                continue;
            }

            paths.push(path);
        }

        Ok(paths)
    }

    /// All records, newest first. Equal timestamps fall back to id order.
    pub fn list_comments(&self) -> Result<Vec<StoredComment>> {
        let mut comments = self
            .comment_paths()?
            .iter()
            .map(|path| StoredComment::read_file(path))
            .collect::<Result<Vec<_>>>()?;

        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(comments)
    }

    pub fn comment_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .comment_paths()?
            .iter()
            .filter_map(|p| p.file_stem()?.to_str().map(str::to_owned))
            .collect())
    }

    /// Check-and-append under the record lock, so the duplicate test and the
    /// increment are one indivisible step.
    pub fn like_comment(&self, id: &str, visitor_id: &str, now: Timestamp) -> Result<LikeOutcome> {
        if !is_valid_id(id) {
            return Ok(LikeOutcome::NotFound);
        }

        let _store = self.lock_shared()?;

        let path = StoredComment::path_for(&self.path, id);
        if !path.exists() {
            return Ok(LikeOutcome::NotFound);
        }

        let _record = self.lock_record(id)?;
        let mut comment = StoredComment::read_file(&path)?;

        if comment.has_liked(visitor_id) {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        comment.add_like(visitor_id, now);
        comment.write_file(&self.path)?;

        Ok(LikeOutcome::Liked(comment))
    }

    /// One-time repair for records persisted before likes existed: fill in
    /// missing `likes`/`liked_by`, drop duplicate visitors and make the count
    /// match the set.
    pub fn backfill_likes(&self) -> Result<BackfillReport> {
        let _store = self.lock_exclusive()?;
        let mut report = BackfillReport::default();

        for path in self.comment_paths()? {
            report.scanned += 1;

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let raw: toml::Table = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            let missing = !raw.contains_key("likes") || !raw.contains_key("liked_by");

            let mut comment: StoredComment = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            let before = comment.liked_by.len();
            let mut seen = HashSet::new();
            comment.liked_by.retain(|v| seen.insert(v.clone()));
            let count = u64::try_from(comment.liked_by.len()).unwrap_or(u64::MAX);

            if missing || before != comment.liked_by.len() || comment.likes != count {
                comment.likes = count;
                comment.write_file(&self.path)?;
                report.updated += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn make_comment(id: &str, created_at: Timestamp) -> StoredComment {
        StoredComment {
            id: id.to_string(),
            name: "00:00".to_string(),
            instagram: None,
            twitter: None,
            facebook: None,
            comment: "00:00".to_string(),
            likes: 0,
            liked_by: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    /// A fresh empty store backed by a temp directory.
    #[fixture]
    fn db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::init(dir.path()).unwrap();
        (dir, db)
    }

    /// A store pre-loaded with one comment ("comment00001").
    #[fixture]
    fn db_with_comment(db: (TempDir, Database)) -> (TempDir, Database) {
        let (dir, db) = db;
        db.create_comment(&make_comment("comment00001", Timestamp::now()), &not_cancelled())
            .unwrap();
        (dir, db)
    }

    // -- atomic_write --

    #[rstest]
    #[case::plain_text(b"hello" as &[u8], "hello")]
    #[case::with_newlines(b"line1\nline2", "line1\nline2")]
    #[case::empty(b"", "")]
    fn atomic_write_persists_content(#[case] input: &[u8], #[case] expected: &str) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.toml");
        atomic_write(&path, input).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    // Rewriting a record replaces it and leaves no temp file behind.
    #[rstest]
    fn atomic_write_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.toml");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!path.with_extension("toml.tmp").exists());
    }

    // -- open / init --

    #[rstest]
    fn open_uninitialized_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Database::open(dir.path()).is_err());
        assert!(Database::open("/tmp/definitely_does_not_exist_guestbook").is_err());
    }

    #[rstest]
    fn init_is_idempotent(db_with_comment: (TempDir, Database)) {
        let (dir, _db) = db_with_comment;
        let again = Database::init(dir.path()).unwrap();
        assert!(again.get_comment("comment00001").unwrap().is_some());
    }

    // -- create_comment --

    #[rstest]
    fn create_comment_persists_to_disk(db_with_comment: (TempDir, Database)) {
        let (dir, _db) = db_with_comment;
        let path = dir.path().join(COMMENTS_DIR).join("comment00001.toml");
        assert!(path.exists());

        let loaded = StoredComment::read_file(&path).unwrap();
        assert_eq!(loaded.id, "comment00001");
    }

    #[rstest]
    fn create_comment_duplicate_fails(db_with_comment: (TempDir, Database)) {
        let (_dir, db) = db_with_comment;
        let dup = make_comment("comment00001", Timestamp::now());
        assert!(db.create_comment(&dup, &not_cancelled()).is_err());
    }

    #[rstest]
    fn cancelled_create_writes_nothing(db: (TempDir, Database)) {
        let (_dir, db) = db;
        let cancelled = AtomicBool::new(true);
        let written = db
            .create_comment(&make_comment("comment00002", Timestamp::now()), &cancelled)
            .unwrap();

        assert!(!written);
        assert!(db.list_comments().unwrap().is_empty());
    }

    // -- get_comment --

    #[rstest]
    #[case::unknown("comment99999")]
    #[case::traversal("../store.lock")]
    #[case::empty("")]
    fn get_comment_misses(db_with_comment: (TempDir, Database), #[case] id: &str) {
        let (_dir, db) = db_with_comment;
        assert!(db.get_comment(id).unwrap().is_none());
    }

    // -- list_comments --

    #[rstest]
    fn list_comments_sorted_by_created_at_desc(db: (TempDir, Database)) {
        let (_dir, db) = db;
        let ts1 = Timestamp::from_millisecond(1_000_000).unwrap();
        let ts2 = Timestamp::from_millisecond(2_000_000).unwrap();

        db.create_comment(&make_comment("commentAAAAA", ts1), &not_cancelled())
            .unwrap();
        db.create_comment(&make_comment("commentBBBBB", ts2), &not_cancelled())
            .unwrap();

        let ids: Vec<String> = db
            .list_comments()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["commentBBBBB", "commentAAAAA"]);
    }

    // Half-written temp files must never show up as records.
    #[rstest]
    fn list_comments_ignores_temp_files(db_with_comment: (TempDir, Database)) {
        let (dir, db) = db_with_comment;
        fs::write(
            dir.path().join(COMMENTS_DIR).join("comment00009.toml.tmp"),
            "id = \"comm",
        )
        .unwrap();

        assert_eq!(db.list_comments().unwrap().len(), 1);
        assert_eq!(db.comment_ids().unwrap(), ["comment00001"]);
    }

    // -- like_comment --

    #[rstest]
    fn like_then_duplicate(db_with_comment: (TempDir, Database)) {
        let (_dir, db) = db_with_comment;

        let first = db
            .like_comment("comment00001", "1.2.3.4", Timestamp::now())
            .unwrap();
        let LikeOutcome::Liked(comment) = first else {
            panic!("expected a like, got {first:?}");
        };
        assert_eq!(comment.likes, 1);
        assert_eq!(comment.liked_by, ["1.2.3.4"]);

        let second = db
            .like_comment("comment00001", "1.2.3.4", Timestamp::now())
            .unwrap();
        assert!(matches!(second, LikeOutcome::AlreadyLiked));

        let stored = db.get_comment("comment00001").unwrap().unwrap();
        assert_eq!(stored.likes, 1);
    }

    #[rstest]
    fn like_unknown_comment(db: (TempDir, Database)) {
        let (_dir, db) = db;
        let outcome = db
            .like_comment("comment99999", "1.2.3.4", Timestamp::now())
            .unwrap();
        assert!(matches!(outcome, LikeOutcome::NotFound));
    }

    // Distinct visitors racing on one record must all be counted.
    #[rstest]
    fn concurrent_likes_are_not_lost(db_with_comment: (TempDir, Database)) {
        let (_dir, db) = db_with_comment;
        let db = Arc::new(db);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    db.like_comment("comment00001", &format!("10.0.0.{i}"), Timestamp::now())
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(matches!(handle.join().unwrap(), LikeOutcome::Liked(_)));
        }

        let stored = db.get_comment("comment00001").unwrap().unwrap();
        assert_eq!(stored.likes, 16);
        assert_eq!(stored.liked_by.len(), 16);
    }

    // The same visitor racing with itself counts once.
    #[rstest]
    fn concurrent_duplicates_count_once(db_with_comment: (TempDir, Database)) {
        let (_dir, db) = db_with_comment;
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    db.like_comment("comment00001", "1.2.3.4", Timestamp::now())
                        .unwrap()
                })
            })
            .collect();

        let liked = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, LikeOutcome::Liked(_)))
            .count();
        assert_eq!(liked, 1);

        let stored = db.get_comment("comment00001").unwrap().unwrap();
        assert_eq!(stored.likes, 1);
    }

    // -- backfill_likes --

    #[rstest]
    fn backfill_repairs_legacy_and_inconsistent_records(db: (TempDir, Database)) {
        let (dir, db) = db;
        let comments = dir.path().join(COMMENTS_DIR);

        fs::write(
            comments.join("legacy000001.toml"),
            "id = \"legacy000001\"\nname = \"00:00\"\ncomment = \"00:00\"\ncreated_at = \"2025-02-14T00:00:00Z\"\n",
        )
        .unwrap();

        let mut skewed = make_comment("skewed000001", Timestamp::now());
        skewed.likes = 5;
        skewed.liked_by = vec!["a".into(), "b".into(), "a".into()];
        skewed.write_file(dir.path()).unwrap();

        db.create_comment(&make_comment("healthy00001", Timestamp::now()), &not_cancelled())
            .unwrap();

        let report = db.backfill_likes().unwrap();
        assert_eq!(report, BackfillReport { scanned: 3, updated: 2 });

        let legacy = fs::read_to_string(comments.join("legacy000001.toml")).unwrap();
        assert!(legacy.contains("likes = 0"));
        assert!(legacy.contains("liked_by"));

        let skewed = db.get_comment("skewed000001").unwrap().unwrap();
        assert_eq!(skewed.likes, 2);
        assert_eq!(skewed.liked_by, ["a", "b"]);

        let again = db.backfill_likes().unwrap();
        assert_eq!(again, BackfillReport { scanned: 3, updated: 0 });
    }

    #[rstest]
    fn ping_fails_once_store_is_gone(db: (TempDir, Database)) {
        let (dir, db) = db;
        assert!(db.ping().is_ok());
        fs::remove_dir_all(dir.path().join(COMMENTS_DIR)).unwrap();
        assert!(db.ping().is_err());
    }
}
