//! Git subprocess adapter
//!
//! Presents the git tool as a set of lazy, line-oriented streams: rev-list,
//! a batch graph dump, branch tips, and the merged log-with-patches stream
//! the history engine consumes. Pure I/O; no interpretation beyond line
//! framing and record grouping happens here.
//!
//! Every stream checks the child's exit status at EOF, so consumers can
//! tell graceful completion from a truncated pipe. Dropping a stream early
//! kills and reaps the child.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::debug;

use crate::error::{RipError, RipResult};
use crate::models::CommitId;

/// Which part of history the streams cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// The first-parent chain of HEAD only.
    Head,
    /// Every commit reachable from any local branch.
    AllBranches,
}

/// Sentinel prefixes of the pretty-format header. The commit sentinel
/// doubles as the record separator: diff content lines always carry a
/// one-character prefix, so no file content can alias it at column zero.
pub const HDR_COMMIT: &str = "!commit!";
pub const HDR_PARENTS: &str = "!parents!";
pub const HDR_AUTHOR: &str = "!author!";
pub const HDR_COMMITTER: &str = "!committer!";
pub const HDR_SIGNED: &str = "!signed!";
pub const HDR_MESSAGE: &str = "!message!";
pub const HDR_END: &str = "!end-header!";

const LOG_PRETTY: &str = "--pretty=tformat:!commit!%H%n!parents!%P%n!author!%aN <%aE> %ad%n!committer!%cN <%cE> %cd%n!signed!%G?%n!message!%s%n!end-header!";

/// Pre-flight: the directory must be an openable repository with a HEAD
/// that resolves to a commit. Empty repositories fail with `NoHead`.
pub fn prepare(repo_dir: &Path) -> RipResult<()> {
    let repo = git2::Repository::open(repo_dir)?;
    let head = repo.head().map_err(|_| RipError::NoHead)?;
    head.peel_to_commit().map_err(|_| RipError::NoHead)?;
    Ok(())
}

/// Launches git subprocesses for one repository.
pub struct GitExec {
    repo_dir: PathBuf,
}

impl GitExec {
    pub fn new(repo_dir: &Path) -> Self {
        Self {
            repo_dir: repo_dir.to_path_buf(),
        }
    }

    /// Commit ids in reverse-chronological order.
    pub fn rev_list(&self, mode: HistoryMode) -> RipResult<impl Iterator<Item = RipResult<CommitId>>> {
        let args: &[&str] = match mode {
            HistoryMode::Head => &["rev-list", "--first-parent", "HEAD"],
            HistoryMode::AllBranches => &["rev-list", "--branches"],
        };
        let lines = self.spawn(args)?;
        Ok(lines.filter(|l| !matches!(l, Ok(s) if s.is_empty())))
    }

    /// Batch graph dump: one `(child, parents)` tuple per reachable commit.
    ///
    /// In `Head` mode the dump is truncated to first parents so the
    /// resulting subgraph is closed under its own parent edges.
    pub fn graph_dump(
        &self,
        mode: HistoryMode,
    ) -> RipResult<impl Iterator<Item = RipResult<(CommitId, Vec<CommitId>)>>> {
        let args: &[&str] = match mode {
            HistoryMode::Head => &["rev-list", "--parents", "--first-parent", "HEAD"],
            HistoryMode::AllBranches => &["rev-list", "--parents", "--branches"],
        };
        let first_parent_only = mode == HistoryMode::Head;
        let lines = self.spawn(args)?;
        Ok(lines.filter_map(move |line| match line {
            Err(e) => Some(Err(e)),
            Ok(line) if line.is_empty() => None,
            Ok(line) => {
                let mut ids = line.split_whitespace().map(str::to_owned);
                let child = ids.next()?;
                let mut parents: Vec<CommitId> = ids.collect();
                if first_parent_only {
                    parents.truncate(1);
                }
                Some(Ok((child, parents)))
            }
        }))
    }

    /// Local branch tips as `(tip_sha, branch_name)` pairs.
    pub fn branch_tips(&self) -> RipResult<Vec<(CommitId, String)>> {
        let lines = self.spawn(&[
            "for-each-ref",
            "--format=%(objectname) %(refname:short)",
            "refs/heads",
        ])?;
        let mut tips = Vec::new();
        for line in lines {
            let line = line?;
            if let Some((sha, name)) = line.split_once(' ') {
                tips.push((sha.to_string(), name.to_string()));
            }
        }
        Ok(tips)
    }

    /// The merged log-with-patches stream in topological order, oldest
    /// first. Merge diffs are taken relative to the first parent. `since`
    /// excludes that commit and its ancestry (checkpoint resume).
    pub fn log_with_patches(
        &self,
        mode: HistoryMode,
        since: Option<&str>,
    ) -> RipResult<RecordStream> {
        let mut args: Vec<String> = [
            "log",
            "--topo-order",
            "--reverse",
            "--no-color",
            "--no-abbrev",
            "--date=raw",
            "-M",
            "-C",
            "-p",
            "--diff-merges=first-parent",
            LOG_PRETTY,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        match mode {
            HistoryMode::Head => {
                args.push("--first-parent".into());
                args.push("HEAD".into());
            }
            HistoryMode::AllBranches => args.push("--branches".into()),
        }
        if let Some(sha) = since {
            args.push("--not".into());
            args.push(sha.to_string());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let lines = self.spawn(&arg_refs)?;
        Ok(RecordStream {
            inner: lines,
            pending: None,
            done: false,
        })
    }

    fn spawn(&self, args: &[&str]) -> RipResult<LineStream> {
        debug!(args = ?args, dir = %self.repo_dir.display(), "spawning git");
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child.stdout.take().expect("stdout requested as piped");
        Ok(LineStream {
            reader: BufReader::with_capacity(1 << 16, stdout),
            guard: ChildGuard { child, reaped: false },
            finished: false,
        })
    }
}

/// Kills the child when a stream is dropped early, so a cancelled consumer
/// never leaves a git process writing into a dead pipe.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn finish(&mut self) -> RipResult<()> {
        self.reaped = true;
        let status = self.child.wait()?;
        if !status.success() {
            return Err(RipError::Io(std::io::Error::other(format!(
                "git exited with {status}"
            ))));
        }
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Lazy line stream over a git child's stdout. Line endings are normalized
/// (`\r\n` and `\n` both yield the bare line); invalid UTF-8 in patch
/// content is replaced rather than failing the run.
pub struct LineStream {
    reader: BufReader<ChildStdout>,
    guard: ChildGuard,
    finished: bool,
}

impl Iterator for LineStream {
    type Item = RipResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                self.finished = true;
                match self.guard.finish() {
                    Ok(()) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                Some(Ok(String::from_utf8_lossy(&buf).into_owned()))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// One commit's worth of log output: sentinel header lines, then the
/// per-file diff sections.
#[derive(Debug, Clone)]
pub struct RawCommitRecord {
    pub lines: Vec<String>,
}

/// Groups the log line stream into per-commit records, splitting on the
/// commit sentinel.
pub struct RecordStream {
    inner: LineStream,
    pending: Option<String>,
    done: bool,
}

impl Iterator for RecordStream {
    type Item = RipResult<RawCommitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let first = match self.pending.take() {
            Some(line) => line,
            None => loop {
                match self.inner.next() {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(Err(e)) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    Some(Ok(line)) if line.starts_with(HDR_COMMIT) => break line,
                    Some(Ok(_)) => continue,
                }
            },
        };

        let mut lines = vec![first];
        loop {
            match self.inner.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(line)) => {
                    if line.starts_with(HDR_COMMIT) {
                        self.pending = Some(line);
                        break;
                    }
                    lines.push(line);
                }
            }
        }
        Some(Ok(RawCommitRecord { lines }))
    }
}
