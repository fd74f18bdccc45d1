//! Comment threading rules: replies go one level deep, no further.

use crate::error::{AppError, Result};

pub const MAX_COMMENT_DEPTH: u8 = 1;
pub const MAX_COMMENT_CHARS: usize = 2_000;

/// Body written over a comment its author deleted.
pub const REMOVED_COMMENT_BODY: &str = "[comentário removido pelo autor]";

/// Depth of a new comment given its parent's depth (`None` for top level).
pub fn reply_depth(parent_depth: Option<u8>) -> Result<u8> {
    match parent_depth {
        None => Ok(0),
        Some(depth) if depth >= MAX_COMMENT_DEPTH => Err(AppError::validation(
            "only one level of replies is allowed per comment",
        )),
        Some(depth) => Ok(depth + 1),
    }
}

/// Trims and bounds a comment body.
pub fn normalize_body(body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::validation("comment cannot be empty"));
    }
    if body.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(format!(
            "comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(body.to_string())
}
