mod comment;

pub use comment::{COMMENTS_DIR, Comment, NewComment, StoredComment, ValidComment};
