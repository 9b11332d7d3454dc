//! Public data model for blame results
//!
//! These types are emitted by the pipeline and serialized as-is for JSON
//! output, so field names are part of the output contract.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 40-character lowercase hex commit digest. Opaque everywhere except
/// display.
pub type CommitId = String;

/// Per-file change kind within a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitStatus::Added => write!(f, "added"),
            CommitStatus::Modified => write!(f, "modified"),
            CommitStatus::Removed => write!(f, "removed"),
            CommitStatus::Renamed => write!(f, "renamed"),
            CommitStatus::Copied => write!(f, "copied"),
        }
    }
}

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// What happened to one file in one commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub status: CommitStatus,
    /// Source path for renames and copies.
    pub renamed_from: Option<String>,
    pub additions: usize,
    pub deletions: usize,
    pub binary: bool,
}

/// One commit parsed from the history stream.
///
/// `parents` is ordered; the first parent is the mainline. `branches` is
/// empty when branch attribution is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: CommitId,
    pub parents: Vec<CommitId>,
    pub author: Signature,
    pub committer: Signature,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files: HashMap<String, FileChange>,
    pub branches: Vec<String>,
    pub signed: bool,
}

/// Final authorship of a single line. Exactly one of `comment`, `code`,
/// `blank` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameLine {
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
    pub comment: bool,
    pub code: bool,
    pub blank: bool,
}

/// A detected license with match confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub confidence: f32,
}

/// One emission: the blame of one file as it exists at one commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameResult {
    pub commit: Commit,
    pub filename: String,
    /// 1:1 with the file's line order at this commit. Empty for removed
    /// and skipped files.
    pub lines: Vec<BlameLine>,
    /// Size of the reconstructed content in bytes.
    pub size: u64,
    pub loc: u64,
    pub sloc: u64,
    pub comments: u64,
    pub blanks: u64,
    pub complexity: u64,
    pub weighted_complexity: f64,
    pub language: String,
    pub license: Option<License>,
    /// Reason the line table was not maintained (e.g. "binary").
    pub skipped: Option<String>,
    pub status: CommitStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(CommitStatus::Added.to_string(), "added");
        assert_eq!(CommitStatus::Renamed.to_string(), "renamed");
    }

    #[test]
    fn blame_result_serializes_roundtrip() {
        let result = BlameResult {
            commit: Commit {
                sha: "a".repeat(40),
                parents: vec![],
                author: Signature {
                    name: "Test User".into(),
                    email: "test@example.com".into(),
                },
                committer: Signature {
                    name: "Test User".into(),
                    email: "test@example.com".into(),
                },
                date: Utc::now(),
                message: "init".into(),
                files: HashMap::new(),
                branches: vec!["master".into()],
                signed: false,
            },
            filename: "src/lib.rs".into(),
            lines: vec![],
            size: 0,
            loc: 0,
            sloc: 0,
            comments: 0,
            blanks: 0,
            complexity: 0,
            weighted_complexity: 0.0,
            language: "Rust".into(),
            license: None,
            skipped: None,
            status: CommitStatus::Added,
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: BlameResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.filename, "src/lib.rs");
        assert_eq!(back.commit.branches, vec!["master".to_string()]);
    }
}
