//! Branch attribution
//!
//! Assigns each reachable commit the set of branch names that own it.
//! Ownership follows first-parent spines: a tip claims its own spine, and
//! names propagate backwards only across first-parent edges, so shared
//! history is never double-counted through merge edges. When two tips sit
//! on the same spine, the lexicographically smaller name wins the shared
//! part.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::git::parents_graph::ParentsGraph;
use crate::models::CommitId;

/// Computes `sha -> sorted branch names` for every commit in the graph.
///
/// Commits reachable only through second-parent edges (their topic branch
/// was deleted after merging) inherit the union of their children's
/// branches in a final pass; first-parent attribution is never altered by
/// it.
pub fn attribute(
    graph: &ParentsGraph,
    tips: &[(CommitId, String)],
) -> FxHashMap<CommitId, Vec<String>> {
    let mut ordered: Vec<&(CommitId, String)> = tips.iter().collect();
    ordered.sort_by(|a, b| a.1.cmp(&b.1));

    // A tip's claim is suppressed when its commit already sits on the
    // first-parent spine of a smaller-named tip.
    let mut spine: FxHashSet<&str> = FxHashSet::default();
    let mut claims: Vec<(&str, &str)> = Vec::new();
    for (sha, name) in ordered {
        if !graph.contains(sha) {
            debug!(branch = %name, tip = %sha, "branch tip outside selected graph, skipping");
            continue;
        }
        if !spine.contains(sha.as_str()) {
            claims.push((sha.as_str(), name.as_str()));
        }
        let mut cursor: Option<&str> = Some(sha.as_str());
        while let Some(sha) = cursor {
            if !spine.insert(sha) {
                break; // spines are identical from the first shared commit
            }
            cursor = graph.first_parent(sha).map(String::as_str);
        }
    }

    let mut owned: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
    for &(sha, name) in &claims {
        owned.entry(sha).or_default().insert(name);
    }

    // Children before parents, so one pass pushes every name down its
    // whole spine.
    let order = graph.topological_order();
    for sha in order.iter().rev() {
        let Some(names) = owned.get(sha.as_str()) else {
            continue;
        };
        if let Some(parent) = graph.first_parent(sha) {
            let names: Vec<&str> = names.iter().copied().collect();
            owned.entry(parent.as_str()).or_default().extend(names);
        }
    }

    // Totality fallback for commits stranded behind merge edges.
    for sha in order.iter().rev() {
        if owned.get(sha.as_str()).is_some_and(|s| !s.is_empty()) {
            continue;
        }
        let inherited: FxHashSet<&str> = graph
            .children(sha)
            .iter()
            .filter_map(|child| owned.get(child.as_str()))
            .flat_map(|s| s.iter().copied())
            .collect();
        if !inherited.is_empty() {
            owned.insert(sha.as_str(), inherited);
        }
    }

    order
        .iter()
        .map(|sha| {
            let mut names: Vec<String> = owned
                .get(sha.as_str())
                .map(|s| s.iter().map(|n| n.to_string()).collect())
                .unwrap_or_default();
            names.sort();
            (sha.clone(), names)
        })
        .collect()
}
