//! Streaming per-commit blame analysis for git histories
//!
//! The core reconstructs per-line authorship for every file at every
//! commit of a repository's history from a single pass over the tool's
//! patches-in-topological-order stream, without running an external blame
//! per commit. Three subsystems carry the weight: the parents graph
//! ([`git::parents_graph`]), the branch attribution pass
//! ([`git::branches`]) and the streaming history engine ([`engine`]).
//! Downstream, [`fileinfo`] decorates each emission with language,
//! license and code metrics.
//!
//! Use [`Ripper::rip`] to stream [`BlameResult`]s into a channel, or
//! [`Ripper::rip_slice`] to collect them.

pub mod cli;
pub mod engine;
pub mod error;
pub mod fileinfo;
pub mod git;
pub mod models;
pub mod ripper;

pub use error::{RipError, RipResult};
pub use models::{
    BlameLine, BlameResult, Commit, CommitStatus, FileChange, License, Signature,
};
pub use ripper::{RipOpts, Ripper};
