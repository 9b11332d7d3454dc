//! In-memory commit DAG
//!
//! Built once from the batch graph dump, frozen afterwards, and shared
//! read-only across the pipeline. Children are the exact transpose of
//! parents; every reachable id is keyed in both maps.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{RipError, RipResult};
use crate::models::CommitId;

#[derive(Debug, Default)]
pub struct ParentsGraph {
    parents_of: FxHashMap<CommitId, Vec<CommitId>>,
    children_of: FxHashMap<CommitId, Vec<CommitId>>,
    heads: Vec<CommitId>,
}

impl ParentsGraph {
    /// Builds the graph from the rev-list stream and the graph dump.
    ///
    /// Any inconsistency between the two is fatal: a commit referenced as
    /// a parent but never listed would silently corrupt blame downstream,
    /// so there is no partial recovery.
    pub fn build(
        rev_list: impl Iterator<Item = RipResult<CommitId>>,
        graph_dump: impl Iterator<Item = RipResult<(CommitId, Vec<CommitId>)>>,
    ) -> RipResult<Self> {
        let listed: FxHashSet<CommitId> = rev_list.collect::<RipResult<_>>()?;

        let mut parents_of: FxHashMap<CommitId, Vec<CommitId>> =
            FxHashMap::with_capacity_and_hasher(listed.len(), Default::default());
        let mut children_of: FxHashMap<CommitId, Vec<CommitId>> =
            FxHashMap::with_capacity_and_hasher(listed.len(), Default::default());

        for entry in graph_dump {
            let (child, parents) = entry?;
            if !listed.contains(&child) {
                return Err(RipError::GraphInconsistent(format!(
                    "commit {child} in graph dump but not in rev-list"
                )));
            }
            for parent in &parents {
                if !listed.contains(parent) {
                    return Err(RipError::GraphInconsistent(format!(
                        "commit {parent} referenced as parent of {child} but never listed"
                    )));
                }
                children_of.entry(parent.clone()).or_default().push(child.clone());
            }
            children_of.entry(child.clone()).or_default();
            parents_of.insert(child, parents);
        }

        for sha in &listed {
            if !parents_of.contains_key(sha) {
                return Err(RipError::GraphInconsistent(format!(
                    "commit {sha} listed by rev-list but missing from graph dump"
                )));
            }
        }

        let mut heads: Vec<CommitId> = children_of
            .iter()
            .filter(|(_, children)| children.is_empty())
            .map(|(sha, _)| sha.clone())
            .collect();
        heads.sort();

        Ok(Self {
            parents_of,
            children_of,
            heads,
        })
    }

    /// Ordered parents; the first parent is the mainline. Empty for roots
    /// and unknown ids.
    pub fn parents(&self, id: &str) -> &[CommitId] {
        self.parents_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: &str) -> &[CommitId] {
        self.children_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_parent(&self, id: &str) -> Option<&CommitId> {
        self.parents(id).first()
    }

    /// Commits with no children.
    pub fn heads(&self) -> &[CommitId] {
        &self.heads
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parents_of.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.parents_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents_of.is_empty()
    }

    /// Kahn's algorithm, oldest to newest, ties broken by ascending sha so
    /// the order is stable across runs.
    pub fn topological_order(&self) -> Vec<CommitId> {
        let mut remaining: FxHashMap<&str, usize> = self
            .parents_of
            .iter()
            .map(|(sha, parents)| (sha.as_str(), parents.len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<&str>> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(sha, _)| Reverse(*sha))
            .collect();

        let mut order = Vec::with_capacity(self.parents_of.len());
        while let Some(Reverse(sha)) = ready.pop() {
            order.push(sha.to_string());
            for child in self.children(sha) {
                if let Some(n) = remaining.get_mut(child.as_str()) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push(Reverse(child.as_str()));
                    }
                }
            }
        }
        order
    }
}
