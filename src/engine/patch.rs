//! Unified-diff hunk model and application
//!
//! A hunk replaces `[old_start, old_start+old_len)` of the previous line
//! vector with a block rebuilt from its body: context lines carry their
//! prior attribution through untouched, `-` lines drop, `+` lines are
//! stamped with the committing author. After application the line count
//! must agree with the hunk headers' arithmetic; any disagreement means
//! the stream and our reconstruction have diverged and the repository
//! cannot be processed further.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Shared authorship stamp: one allocation per commit, referenced by every
/// line that commit wrote.
#[derive(Debug, PartialEq, Eq)]
pub struct CommitSig {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

/// One line of a reconstructed file: its text and the commit that last
/// wrote it. Cloning is two refcount bumps.
#[derive(Debug, Clone)]
pub struct Line {
    pub text: Arc<str>,
    pub sig: Arc<CommitSig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    /// Unchanged line; keeps prior attribution.
    Context,
    /// Dropped from the old image.
    Removed,
    /// Introduced by this commit; carries the new text.
    Added(String),
}

/// A contiguous diff region. Starts are 1-based; a zero length means the
/// start refers to the position after which insertion (or from which
/// deletion) happens, per the unified format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

/// Parses `@@ -old_start[,old_len] +new_start[,new_len] @@`; omitted
/// lengths default to 1.
pub fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let rest = line.strip_prefix("@@ -")?;
    let (old_part, rest) = rest.split_once(" +")?;
    let (new_part, _) = rest.split_once(" @@")?;
    let (old_start, old_len) = parse_range(old_part)?;
    let (new_start, new_len) = parse_range(new_part)?;
    Some((old_start, old_len, new_start, new_len))
}

fn parse_range(s: &str) -> Option<(usize, usize)> {
    match s.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Raised when hunks do not fit the old image or their own headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyError;

/// Applies `hunks` in file order over `old`, stamping added lines with
/// `stamp`. Returns the new line vector.
pub fn apply_hunks(old: &[Line], hunks: &[Hunk], stamp: &Arc<CommitSig>) -> Result<Vec<Line>, ApplyError> {
    let expected_total = hunks.iter().fold(old.len() as i64, |acc, h| {
        acc + h.new_len as i64 - h.old_len as i64
    });
    if expected_total < 0 {
        return Err(ApplyError);
    }
    let mut out: Vec<Line> = Vec::with_capacity(expected_total as usize);

    let mut cursor = 0usize;
    for hunk in hunks {
        // old_start is 1-based except when old_len is 0, where it names
        // the line after which the hunk sits.
        let anchor = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.checked_sub(1).ok_or(ApplyError)?
        };
        if anchor < cursor || anchor > old.len() {
            return Err(ApplyError);
        }
        out.extend_from_slice(&old[cursor..anchor]);
        cursor = anchor;

        let (mut seen_old, mut seen_new) = (0usize, 0usize);
        for line in &hunk.lines {
            match line {
                HunkLine::Context => {
                    let kept = old.get(cursor).ok_or(ApplyError)?;
                    out.push(kept.clone());
                    cursor += 1;
                    seen_old += 1;
                    seen_new += 1;
                }
                HunkLine::Removed => {
                    if cursor >= old.len() {
                        return Err(ApplyError);
                    }
                    cursor += 1;
                    seen_old += 1;
                }
                HunkLine::Added(text) => {
                    out.push(Line {
                        text: Arc::from(text.as_str()),
                        sig: Arc::clone(stamp),
                    });
                    seen_new += 1;
                }
            }
        }
        if seen_old != hunk.old_len || seen_new != hunk.new_len {
            return Err(ApplyError);
        }
    }
    out.extend_from_slice(&old[cursor..]);

    if out.len() as i64 != expected_total {
        return Err(ApplyError);
    }
    Ok(out)
}
