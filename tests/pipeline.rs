//! End-to-end pipeline tests on fixture repositories.
//!
//! Fixtures are built with git2 using fixed signature timestamps, so runs
//! are deterministic. Trees are written directly (no index/workdir), which
//! keeps multi-branch histories simple to construct.

use std::collections::HashSet;

use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

use repoblame::{BlameResult, CommitStatus, RipError, RipOpts, Ripper};

struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let repo = Repository::init(dir.path()).expect("init repo");
        repo.set_head("refs/heads/master").expect("set head");
        Self { dir, repo }
    }

    fn sig(name: &str, when: i64) -> Signature<'static> {
        Signature::new(name, &format!("{name}@example.com"), &Time::new(when, 0))
            .expect("signature")
    }

    /// Commits a complete tree snapshot of text files.
    fn commit(
        &self,
        update_ref: &str,
        parents: &[Oid],
        files: &[(&str, &str)],
        author: &str,
        when: i64,
        message: &str,
    ) -> Oid {
        let bytes: Vec<(&str, &[u8])> =
            files.iter().map(|&(name, text)| (name, text.as_bytes())).collect();
        self.commit_bytes(update_ref, parents, &bytes, author, when, message)
    }

    fn commit_bytes(
        &self,
        update_ref: &str,
        parents: &[Oid],
        files: &[(&str, &[u8])],
        author: &str,
        when: i64,
        message: &str,
    ) -> Oid {
        let mut builder = self.repo.treebuilder(None).expect("treebuilder");
        for &(name, content) in files {
            let blob = self.repo.blob(content).expect("write blob");
            builder.insert(name, blob, 0o100644).expect("insert entry");
        }
        let tree = self
            .repo
            .find_tree(builder.write().expect("write tree"))
            .expect("find tree");
        let parents: Vec<git2::Commit> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).expect("find parent"))
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let sig = Self::sig(author, when);
        self.repo
            .commit(Some(update_ref), &sig, &sig, message, &tree, &parent_refs)
            .expect("commit")
    }

    fn rip(&self, opts: &RipOpts) -> Result<Vec<BlameResult>, RipError> {
        Ripper::new().rip_slice(self.dir.path(), opts)
    }
}

fn line_authors(result: &BlameResult) -> Vec<&str> {
    result.lines.iter().map(|l| l.name.as_str()).collect()
}

fn find<'a>(results: &'a [BlameResult], sha: &Oid, filename: &str) -> &'a BlameResult {
    results
        .iter()
        .find(|r| r.commit.sha == sha.to_string() && r.filename == filename)
        .unwrap_or_else(|| panic!("no emission for {sha}:{filename}"))
}

/// Builds: a <- b <- m on master, a <- c on branch b, m merges c.
/// The merged-in branch adds topic.txt; master adds m.txt.
fn multiple_branches() -> (TestRepo, Oid, Oid, Oid, Oid) {
    let t = TestRepo::new();
    let base = "line one\nline two\nline three\n";
    let a = t.commit(
        "refs/heads/master",
        &[],
        &[("test.txt", base)],
        "alice",
        1_000_000,
        "init",
    );
    let b = t.commit(
        "refs/heads/master",
        &[a],
        &[("test.txt", base), ("m.txt", "on master\n")],
        "bob",
        1_000_100,
        "master work",
    );
    let c = t.commit(
        "refs/heads/b",
        &[a],
        &[
            ("test.txt", base),
            ("topic.txt", "from topic\nsecond topic line\n"),
        ],
        "carol",
        1_000_200,
        "topic work",
    );
    let m = t.commit(
        "refs/heads/master",
        &[b, c],
        &[
            ("test.txt", base),
            ("m.txt", "on master\n"),
            ("topic.txt", "from topic\nsecond topic line\n"),
        ],
        "merger",
        1_000_300,
        "merge b",
    );
    (t, a, b, c, m)
}

#[test]
fn all_branches_attributes_shared_history_once() {
    let (t, a, b, c, m) = multiple_branches();
    let results = t
        .rip(&RipOpts {
            all_branches: true,
            ..Default::default()
        })
        .expect("rip");

    assert_eq!(results.len(), 4, "one emission per touched file per commit");

    assert_eq!(find(&results, &a, "test.txt").commit.branches, ["b", "master"]);
    assert_eq!(find(&results, &b, "m.txt").commit.branches, ["master"]);
    assert_eq!(find(&results, &c, "topic.txt").commit.branches, ["b"]);
    assert_eq!(find(&results, &m, "topic.txt").commit.branches, ["master"]);

    // Branch totality: every emitted commit owns at least one branch.
    for result in &results {
        assert!(!result.commit.branches.is_empty());
    }

    // Topic lines belong to carol on the topic commit; the merge brings
    // them to master's chain attributed to the merge author.
    assert_eq!(line_authors(find(&results, &c, "topic.txt")), ["carol", "carol"]);
    assert_eq!(line_authors(find(&results, &m, "topic.txt")), ["merger", "merger"]);
}

#[test]
fn all_branches_off_walks_first_parent_history_only() {
    let (t, a, b, c, m) = multiple_branches();
    let results = t.rip(&RipOpts::default()).expect("rip");

    // a, b and the merge; the topic commit is not on the first-parent
    // chain of HEAD.
    assert_eq!(results.len(), 3);
    assert!(!results.iter().any(|r| r.commit.sha == c.to_string()));
    for result in &results {
        assert!(result.commit.branches.is_empty());
    }

    assert_eq!(find(&results, &a, "test.txt").loc, 3);
    assert_eq!(find(&results, &b, "m.txt").status, CommitStatus::Added);
    assert_eq!(line_authors(find(&results, &m, "topic.txt")), ["merger", "merger"]);
}

#[test]
fn emission_order_follows_the_commit_stream() {
    let (t, a, _, _, m) = multiple_branches();
    let results = t
        .rip(&RipOpts {
            all_branches: true,
            ..Default::default()
        })
        .expect("rip");

    assert_eq!(results.first().expect("first").commit.sha, a.to_string());
    assert_eq!(results.last().expect("last").commit.sha, m.to_string());
}

#[test]
fn modified_line_is_reattributed() {
    let t = TestRepo::new();
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("f.txt", "alpha\nbeta\ngamma\n")],
        "alice",
        1_000_000,
        "add",
    );
    let c2 = t.commit(
        "refs/heads/master",
        &[c1],
        &[("f.txt", "alpha\nBETA\ngamma\n")],
        "bob",
        1_000_100,
        "edit line two",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    assert_eq!(results.len(), 2);
    assert_eq!(line_authors(find(&results, &c1, "f.txt")), ["alice", "alice", "alice"]);
    let edited = find(&results, &c2, "f.txt");
    assert_eq!(line_authors(edited), ["alice", "bob", "alice"]);
    assert_eq!(edited.status, CommitStatus::Modified);

    let change = &edited.commit.files["f.txt"];
    assert_eq!(change.additions, 1);
    assert_eq!(change.deletions, 1);
    assert!(!change.binary);

    // Line dates follow the stamping commit.
    assert_eq!(edited.lines[0].date.timestamp(), 1_000_000);
    assert_eq!(edited.lines[1].date.timestamp(), 1_000_100);
}

#[test]
fn rename_with_edit_carries_prior_authorship() {
    let t = TestRepo::new();
    let before = "one\ntwo\nthree\nfour\nfive\nsix\n";
    let after = "one\ntwo\nthree\nfour\nfive\nSIX\n";
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("notes.txt", before)],
        "alice",
        1_000_000,
        "add notes",
    );
    let c2 = t.commit(
        "refs/heads/master",
        &[c1],
        &[("docs.txt", after)],
        "bob",
        1_000_100,
        "rename and touch",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    // The rename is one emission, not an add plus a delete.
    let at_c2: Vec<_> = results
        .iter()
        .filter(|r| r.commit.sha == c2.to_string())
        .collect();
    assert_eq!(at_c2.len(), 1);

    let renamed = find(&results, &c2, "docs.txt");
    assert_eq!(renamed.status, CommitStatus::Renamed);
    assert_eq!(
        renamed.commit.files["docs.txt"].renamed_from.as_deref(),
        Some("notes.txt")
    );
    assert_eq!(
        line_authors(renamed),
        ["alice", "alice", "alice", "alice", "alice", "bob"]
    );
}

#[test]
fn binary_files_are_skipped() {
    let t = TestRepo::new();
    let c1 = t.commit_bytes(
        "refs/heads/master",
        &[],
        &[("logo.png", &[0x89u8, 0x50, 0x4e, 0x47, 0x00, 0x01, 0x02, 0x00][..])],
        "alice",
        1_000_000,
        "add logo",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    assert_eq!(results.len(), 1);
    let skipped = find(&results, &c1, "logo.png");
    assert_eq!(skipped.skipped.as_deref(), Some("binary"));
    assert!(skipped.lines.is_empty());
    assert_eq!(skipped.status, CommitStatus::Added);
    assert_eq!(skipped.loc, 0);
}

#[test]
fn removed_file_emits_empty_lines() {
    let t = TestRepo::new();
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("f.txt", "soon gone\n"), ("keep.txt", "stays\n")],
        "alice",
        1_000_000,
        "add",
    );
    let c2 = t.commit(
        "refs/heads/master",
        &[c1],
        &[("keep.txt", "stays\n")],
        "bob",
        1_000_100,
        "remove f",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    let removed = find(&results, &c2, "f.txt");
    assert_eq!(removed.status, CommitStatus::Removed);
    assert!(removed.lines.is_empty());
    assert_eq!(removed.loc, 0);
}

#[test]
fn empty_repository_is_no_head() {
    let dir = tempfile::tempdir().expect("create temp dir");
    Repository::init(dir.path()).expect("init repo");
    let err = Ripper::new()
        .rip_slice(dir.path(), &RipOpts::default())
        .unwrap_err();
    assert!(matches!(err, RipError::NoHead));
}

#[test]
fn initial_commit_emits_once_per_file() {
    let t = TestRepo::new();
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("a.txt", "a\n"), ("b.txt", "b\n")],
        "alice",
        1_000_000,
        "init",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    assert_eq!(results.len(), 2);
    let names: HashSet<&str> = results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, HashSet::from(["a.txt", "b.txt"]));
    for result in &results {
        assert_eq!(result.commit.sha, c1.to_string());
        assert_eq!(result.status, CommitStatus::Added);
    }
}

#[test]
fn runs_are_idempotent() {
    let (t, _, _, _, _) = multiple_branches();
    let opts = RipOpts {
        all_branches: true,
        ..Default::default()
    };
    let first = t.rip(&opts).expect("first run");
    let second = t.rip(&opts).expect("second run");

    let key = |results: &[BlameResult]| -> Vec<(String, String, Vec<String>, Vec<String>)> {
        results
            .iter()
            .map(|r| {
                (
                    r.commit.sha.clone(),
                    r.filename.clone(),
                    r.commit.branches.clone(),
                    r.lines.iter().map(|l| l.name.clone()).collect(),
                )
            })
            .collect()
    };
    assert_eq!(key(&first), key(&second));
}

#[test]
fn commit_from_incl_starts_emission_at_that_commit() {
    let t = TestRepo::new();
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("f.txt", "alpha\nbeta\ngamma\n")],
        "alice",
        1_000_000,
        "add",
    );
    let c2 = t.commit(
        "refs/heads/master",
        &[c1],
        &[("f.txt", "alpha\nBETA\ngamma\n")],
        "bob",
        1_000_100,
        "edit",
    );
    let results = t
        .rip(&RipOpts {
            commit_from_incl: Some(c2.to_string()),
            ..Default::default()
        })
        .expect("rip");

    // Only the resumed-from commit is emitted, but its attribution still
    // reflects the earlier history.
    assert_eq!(results.len(), 1);
    assert_eq!(line_authors(&results[0]), ["alice", "bob", "alice"]);
}

#[test]
fn checkpoint_resume_skips_processed_history() {
    let t = TestRepo::new();
    let checkpoints = tempfile::tempdir().expect("checkpoint dir");
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("f.txt", "alpha\nbeta\ngamma\n")],
        "alice",
        1_000_000,
        "add",
    );
    let opts = RipOpts {
        checkpoints_dir: Some(checkpoints.path().to_path_buf()),
        no_strict_resume: true,
        ..Default::default()
    };

    let first = t.rip(&opts).expect("first run");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].commit.sha, c1.to_string());

    let c2 = t.commit(
        "refs/heads/master",
        &[c1],
        &[("f.txt", "alpha\nBETA\ngamma\n")],
        "bob",
        1_000_100,
        "edit",
    );
    let second = t.rip(&opts).expect("second run");

    // Only the new commit streams, and the restored tree still supplies
    // the old attribution.
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].commit.sha, c2.to_string());
    assert_eq!(line_authors(&second[0]), ["alice", "bob", "alice"]);
}

#[test]
fn line_counts_match_file_contents() {
    let (t, a, _, _, m) = multiple_branches();
    let results = t
        .rip(&RipOpts {
            all_branches: true,
            ..Default::default()
        })
        .expect("rip");

    assert_eq!(find(&results, &a, "test.txt").lines.len(), 3);
    assert_eq!(find(&results, &m, "topic.txt").lines.len(), 2);

    for result in &results {
        assert_eq!(result.loc as usize, result.lines.len());
    }
}

#[test]
fn commit_metadata_is_parsed() {
    let t = TestRepo::new();
    let c1 = t.commit(
        "refs/heads/master",
        &[],
        &[("f.txt", "x\n")],
        "alice",
        1_000_000,
        "first subject",
    );
    let results = t.rip(&RipOpts::default()).expect("rip");

    let commit = &find(&results, &c1, "f.txt").commit;
    assert_eq!(commit.author.name, "alice");
    assert_eq!(commit.author.email, "alice@example.com");
    assert_eq!(commit.date.timestamp(), 1_000_000);
    assert_eq!(commit.message, "first subject");
    assert!(commit.parents.is_empty());
    assert!(!commit.signed);
}
