//! Error taxonomy for the blame pipeline.
//!
//! Pre-flight errors (`NoHead`) let the caller retry with another path.
//! Structural errors (`GraphInconsistent`, `MalformedCommit`,
//! `PatchApplyFailed`) are unrecoverable for the repository: a corrupt DAG
//! or a mis-applied patch would silently corrupt every downstream blame.
//! Soft conditions (binary files, unknown languages, undetected licenses)
//! are not errors and are represented on the emission itself.

use thiserror::Error;

/// Errors surfaced by a rip invocation. All of these are terminal: the
/// result stream is closed and pipeline stages are unwound.
#[derive(Error, Debug)]
pub enum RipError {
    #[error("repository has no resolvable HEAD commit")]
    NoHead,

    #[error("commit graph is inconsistent: {0}")]
    GraphInconsistent(String),

    #[error("malformed commit record {sha} at line {offset}")]
    MalformedCommit { sha: String, offset: usize },

    #[error("patch did not apply cleanly for {path} at commit {sha}")]
    PatchApplyFailed { sha: String, path: String },

    #[error("processing cancelled by consumer")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

pub type RipResult<T> = Result<T, RipError>;
