//! Streaming history engine
//!
//! Consumes parsed commits in topological order and maintains, for every
//! commit that still has unvisited children, the reconstructed working
//! tree with per-line authorship. Trees share unchanged `FileBlame`s
//! behind `Arc`s, so carrying a commit forward costs one map clone plus
//! refcount bumps; only files touched by a commit are rebuilt.
//!
//! The engine is single-threaded by construction. Its only outputs are
//! `Emission` values: one per touched file per commit, in commit order.

pub mod checkpoint;
pub mod patch;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{RipError, RipResult};
use crate::git::commit_meta::{FileDiff, ParsedCommit};
use crate::git::parents_graph::ParentsGraph;
use crate::models::{Commit, CommitId, CommitStatus};

pub use patch::{CommitSig, Line};

/// Authorship of one file at one commit.
#[derive(Debug, Default)]
pub struct FileBlame {
    pub lines: Vec<Line>,
}

/// A file in a reconstructed tree. Binary files keep no line table but
/// stay tracked so later renames of them remain classifiable.
#[derive(Debug, Clone)]
pub enum FileEntry {
    Text(Arc<FileBlame>),
    Binary,
}

/// The reconstructed working tree at one commit. Cloning shares all file
/// entries with the source tree.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub files: FxHashMap<String, FileEntry>,
}

/// One blame emission before decoration: the commit, the touched path and
/// a by-value snapshot of its line table.
#[derive(Debug, Clone)]
pub struct Emission {
    /// Monotone sequence number; the forwarder restores order on it after
    /// the decorator pool.
    pub seq: u64,
    pub commit: Arc<Commit>,
    pub filename: String,
    pub status: CommitStatus,
    pub lines: Vec<Line>,
    pub skipped: Option<String>,
}

#[derive(Debug, Default)]
pub struct EngineOpts {
    /// Suppress emissions until this commit is reached (inclusive). Trees
    /// are still built for everything before it.
    pub commit_from_incl: Option<CommitId>,
    /// Keep final trees of head commits for checkpointing.
    pub retain_frontier: bool,
}

pub struct HistoryEngine {
    graph: Arc<ParentsGraph>,
    tree_at: FxHashMap<CommitId, Tree>,
    remaining_children: FxHashMap<CommitId, usize>,
    frontier: FxHashMap<CommitId, Tree>,
    retain_frontier: bool,
    commit_from_incl: Option<CommitId>,
    emitting: bool,
    next_seq: u64,
    last_processed: Option<CommitId>,
}

impl HistoryEngine {
    pub fn new(graph: Arc<ParentsGraph>, opts: EngineOpts) -> Self {
        let emitting = opts.commit_from_incl.is_none();
        Self {
            graph,
            tree_at: FxHashMap::default(),
            remaining_children: FxHashMap::default(),
            frontier: FxHashMap::default(),
            retain_frontier: opts.retain_frontier,
            commit_from_incl: opts.commit_from_incl,
            emitting,
            next_seq: 0,
            last_processed: None,
        }
    }

    /// Restores a tree saved by a previous run. The stream is expected to
    /// start past the restored commits, so emission starts immediately.
    pub fn seed_tree(&mut self, sha: CommitId, tree: Tree) {
        self.emitting = true;
        self.commit_from_incl = None;
        let children = self.graph.children(&sha).len();
        if children == 0 {
            self.frontier.insert(sha, tree);
        } else {
            self.remaining_children.insert(sha.clone(), children);
            self.tree_at.insert(sha, tree);
        }
    }

    /// Applies one commit and returns its emissions, in the file order the
    /// tool listed.
    pub fn process(&mut self, parsed: ParsedCommit) -> RipResult<Vec<Emission>> {
        let sha = parsed.commit.sha.clone();

        if !self.emitting {
            if let Some(from) = &self.commit_from_incl {
                if from == &sha {
                    self.emitting = true;
                }
            }
        }

        let mut tree = match parsed.commit.parents.first() {
            Some(parent) => match self.tree_at.get(parent) {
                Some(base) => base.clone(),
                None => {
                    // Only possible across a loose checkpoint resume; the
                    // patch arithmetic will catch real divergence.
                    warn!(commit = %sha, parent = %parent, "base tree missing, starting empty");
                    Tree::default()
                }
            },
            None => Tree::default(),
        };

        let stamp = Arc::new(CommitSig {
            name: parsed.commit.author.name.clone(),
            email: parsed.commit.author.email.clone(),
            date: parsed.commit.date,
        });
        let other_parents: Vec<CommitId> = parsed
            .commit
            .parents
            .iter()
            .skip(1)
            .cloned()
            .collect();
        let commit = Arc::new(parsed.commit);

        let mut emissions = Vec::with_capacity(parsed.diffs.len());
        for diff in parsed.diffs {
            let filename = diff.path.clone();
            let status = diff.change.status;
            let (lines, skipped) = self.apply_diff(&mut tree, diff, &stamp, &sha, &other_parents)?;
            if self.emitting {
                emissions.push(Emission {
                    seq: self.next_seq,
                    commit: Arc::clone(&commit),
                    filename,
                    status,
                    lines,
                    skipped,
                });
                self.next_seq += 1;
            }
        }

        self.retire(&sha, tree);
        self.last_processed = Some(sha);
        Ok(emissions)
    }

    /// Drains the engine: frontier trees (for checkpointing) plus the last
    /// processed commit.
    pub fn finish(mut self) -> (FxHashMap<CommitId, Tree>, Option<CommitId>) {
        // Trees that never hit a zero child count (loose resume overshoot)
        // still belong to the frontier.
        for (sha, tree) in self.tree_at.drain() {
            self.frontier.entry(sha).or_insert(tree);
        }
        (self.frontier, self.last_processed)
    }

    fn retire(&mut self, sha: &CommitId, tree: Tree) {
        let children = self.graph.children(sha).len();
        if children == 0 {
            if self.retain_frontier {
                self.frontier.insert(sha.clone(), tree);
            }
        } else {
            self.remaining_children.insert(sha.clone(), children);
            self.tree_at.insert(sha.clone(), tree);
        }
        for parent in self.graph.parents(sha) {
            if let Some(n) = self.remaining_children.get_mut(parent) {
                *n -= 1;
                if *n == 0 {
                    self.remaining_children.remove(parent);
                    self.tree_at.remove(parent);
                }
            }
        }
    }

    fn apply_diff(
        &self,
        tree: &mut Tree,
        diff: FileDiff,
        stamp: &Arc<CommitSig>,
        sha: &str,
        other_parents: &[CommitId],
    ) -> RipResult<(Vec<Line>, Option<String>)> {
        let failed = || RipError::PatchApplyFailed {
            sha: sha.to_string(),
            path: diff.path.clone(),
        };

        match diff.change.status {
            CommitStatus::Added => {
                if diff.change.binary {
                    tree.files.insert(diff.path.clone(), FileEntry::Binary);
                    return Ok((Vec::new(), Some("binary".into())));
                }
                let lines =
                    patch::apply_hunks(&[], &diff.hunks, stamp).map_err(|_| failed())?;
                self.store(tree, &diff.path, &lines);
                Ok((lines, None))
            }
            CommitStatus::Removed => {
                let was = tree.files.remove(&diff.path);
                let skipped = (diff.change.binary || matches!(was, Some(FileEntry::Binary)))
                    .then(|| "binary".to_string());
                Ok((Vec::new(), skipped))
            }
            CommitStatus::Modified => {
                if diff.change.binary {
                    tree.files.insert(diff.path.clone(), FileEntry::Binary);
                    return Ok((Vec::new(), Some("binary".into())));
                }
                let prior = match tree.files.get(&diff.path) {
                    Some(FileEntry::Text(blame)) => Some(Arc::clone(blame)),
                    Some(FileEntry::Binary) | None => None,
                };
                let old = prior.as_ref().map(|b| b.lines.as_slice()).unwrap_or(&[]);
                let lines = patch::apply_hunks(old, &diff.hunks, stamp).map_err(|_| failed())?;
                self.store(tree, &diff.path, &lines);
                Ok((lines, None))
            }
            CommitStatus::Renamed | CommitStatus::Copied => {
                let source = diff.change.renamed_from.as_deref();
                let entry = source.and_then(|src| {
                    let local = if diff.change.status == CommitStatus::Renamed {
                        tree.files.remove(src)
                    } else {
                        tree.files.get(src).cloned()
                    };
                    local.or_else(|| self.lookup_in_parents(other_parents, src))
                });
                if diff.change.binary || matches!(entry, Some(FileEntry::Binary)) {
                    tree.files.insert(diff.path.clone(), FileEntry::Binary);
                    return Ok((Vec::new(), Some("binary".into())));
                }
                let prior = match entry {
                    Some(FileEntry::Text(blame)) => Some(blame),
                    _ => None,
                };
                let old = prior.as_ref().map(|b| b.lines.as_slice()).unwrap_or(&[]);
                let lines = patch::apply_hunks(old, &diff.hunks, stamp).map_err(|_| failed())?;
                self.store(tree, &diff.path, &lines);
                Ok((lines, None))
            }
        }
    }

    /// Rename and copy sources that do not exist in the first parent are
    /// resolved against the other retained parents of a merge.
    fn lookup_in_parents(&self, parents: &[CommitId], path: &str) -> Option<FileEntry> {
        parents
            .iter()
            .filter_map(|p| self.tree_at.get(p))
            .find_map(|tree| tree.files.get(path).cloned())
    }

    fn store(&self, tree: &mut Tree, path: &str, lines: &[Line]) {
        tree.files.insert(
            path.to_string(),
            FileEntry::Text(Arc::new(FileBlame {
                lines: lines.to_vec(),
            })),
        );
    }
}
