//! Resume checkpoints
//!
//! A checkpoint directory holds a schema marker, the serialized frontier
//! trees keyed by commit, and the last processed commit. Layout is opaque
//! to callers; a schema bump silently invalidates old checkpoints.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{patch::CommitSig, patch::Line, FileBlame, FileEntry, Tree};
use crate::error::RipResult;
use crate::models::CommitId;

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_FILE: &str = "schema";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointState {
    pub last_commit: CommitId,
    pub trees: HashMap<CommitId, HashMap<String, CheckpointEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointEntry {
    Binary,
    Text { lines: Vec<CheckpointLine> },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointLine {
    pub text: String,
    pub name: String,
    pub email: String,
    pub date: DateTime<Utc>,
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Loads the saved state, or None when the directory is missing,
    /// unreadable, or from another schema.
    pub fn load(&self) -> Option<CheckpointState> {
        let schema = fs::read_to_string(self.dir.join(SCHEMA_FILE)).ok()?;
        if schema.trim().parse::<u32>().ok()? != SCHEMA_VERSION {
            debug!(dir = %self.dir.display(), "checkpoint schema mismatch, ignoring");
            return None;
        }
        let raw = fs::read_to_string(self.dir.join(STATE_FILE)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "unreadable checkpoint state, ignoring");
                None
            }
        }
    }

    /// Writes the state atomically (write to a temp name, then rename).
    pub fn save(&self, state: &CheckpointState) -> RipResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(SCHEMA_FILE), format!("{SCHEMA_VERSION}\n"))?;
        let tmp = self.dir.join(format!("{STATE_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec(state).map_err(std::io::Error::other)?)?;
        fs::rename(&tmp, self.dir.join(STATE_FILE))?;
        Ok(())
    }
}

/// Converts live frontier trees into their serializable form.
pub fn freeze(trees: &FxHashMap<CommitId, Tree>, last_commit: CommitId) -> CheckpointState {
    let trees = trees
        .iter()
        .map(|(sha, tree)| {
            let files = tree
                .files
                .iter()
                .map(|(path, entry)| {
                    let entry = match entry {
                        FileEntry::Binary => CheckpointEntry::Binary,
                        FileEntry::Text(blame) => CheckpointEntry::Text {
                            lines: blame
                                .lines
                                .iter()
                                .map(|line| CheckpointLine {
                                    text: line.text.to_string(),
                                    name: line.sig.name.clone(),
                                    email: line.sig.email.clone(),
                                    date: line.sig.date,
                                })
                                .collect(),
                        },
                    };
                    (path.clone(), entry)
                })
                .collect();
            (sha.clone(), files)
        })
        .collect();
    CheckpointState { last_commit, trees }
}

/// Rebuilds live trees from a saved state. Identical stamps within a file
/// are re-shared behind one allocation.
pub fn thaw(state: CheckpointState) -> (FxHashMap<CommitId, Tree>, CommitId) {
    let mut trees = FxHashMap::default();
    for (sha, files) in state.trees {
        let mut tree = Tree::default();
        for (path, entry) in files {
            let entry = match entry {
                CheckpointEntry::Binary => FileEntry::Binary,
                CheckpointEntry::Text { lines } => {
                    let mut stamps: HashMap<(String, i64), Arc<CommitSig>> = HashMap::new();
                    let lines = lines
                        .into_iter()
                        .map(|line| {
                            let key = (line.email.clone(), line.date.timestamp());
                            let sig = stamps
                                .entry(key)
                                .or_insert_with(|| {
                                    Arc::new(CommitSig {
                                        name: line.name,
                                        email: line.email,
                                        date: line.date,
                                    })
                                })
                                .clone();
                            Line {
                                text: Arc::from(line.text.as_str()),
                                sig,
                            }
                        })
                        .collect();
                    FileEntry::Text(Arc::new(FileBlame { lines }))
                }
            };
            tree.files.insert(path, entry);
        }
        trees.insert(sha, tree);
    }
    (trees, state.last_commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_tree() -> Tree {
        let sig = Arc::new(CommitSig {
            name: "alice".into(),
            email: "alice@example.com".into(),
            date: Utc.timestamp_opt(1_575_309_779, 0).unwrap(),
        });
        let mut tree = Tree::default();
        tree.files.insert(
            "src/lib.rs".into(),
            FileEntry::Text(Arc::new(FileBlame {
                lines: vec![
                    Line {
                        text: Arc::from("pub fn x() {}"),
                        sig: Arc::clone(&sig),
                    },
                    Line {
                        text: Arc::from(""),
                        sig,
                    },
                ],
            })),
        );
        tree.files.insert("logo.png".into(), FileEntry::Binary);
        tree
    }

    #[test]
    fn freeze_thaw_roundtrip() {
        let mut trees = FxHashMap::default();
        trees.insert("a".repeat(40), sample_tree());
        let state = freeze(&trees, "a".repeat(40));
        let (back, last) = thaw(state);
        assert_eq!(last, "a".repeat(40));
        let tree = &back[&"a".repeat(40)];
        match &tree.files["src/lib.rs"] {
            FileEntry::Text(blame) => {
                assert_eq!(blame.lines.len(), 2);
                assert_eq!(&*blame.lines[0].text, "pub fn x() {}");
                assert_eq!(blame.lines[0].sig.name, "alice");
                // Stamps of the same commit share one allocation again.
                assert!(Arc::ptr_eq(&blame.lines[0].sig, &blame.lines[1].sig));
            }
            FileEntry::Binary => panic!("expected text entry"),
        }
        assert!(matches!(tree.files["logo.png"], FileEntry::Binary));
    }

    #[test]
    fn store_roundtrip_and_schema_guard() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        assert!(store.load().is_none());

        let mut trees = FxHashMap::default();
        trees.insert("b".repeat(40), sample_tree());
        store.save(&freeze(&trees, "b".repeat(40))).unwrap();

        let state = store.load().expect("saved state loads");
        assert_eq!(state.last_commit, "b".repeat(40));

        fs::write(dir.path().join("schema"), "999\n").unwrap();
        assert!(store.load().is_none());
    }
}
