//! Commit record parser
//!
//! Turns one raw log record into a `Commit` (minus branch attribution)
//! plus its per-file diffs. The parser is a state machine
//! `Header -> FileStatus -> Patches -> End`: header lines carry sentinel
//! prefixes emitted by the pretty format, file status is derived from the
//! extended diff headers, and hunk bodies are consumed by exact line
//! counts from their `@@` headers. Any line that fits no state fails the
//! record; guessing here would corrupt blame silently.
//!
//! Signatures are parsed as `Name <email> epoch tz`. The name is taken
//! from the front and the epoch from the tail, so embedded spaces in
//! names survive.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::engine::patch::{parse_hunk_header, Hunk, HunkLine};
use crate::error::{RipError, RipResult};
use crate::git::exec::{
    RawCommitRecord, HDR_AUTHOR, HDR_COMMIT, HDR_COMMITTER, HDR_END, HDR_MESSAGE, HDR_PARENTS,
    HDR_SIGNED,
};
use crate::models::{Commit, CommitStatus, FileChange, Signature};

/// One file's diff within a commit, in the order git listed it.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub change: FileChange,
    pub hunks: Vec<Hunk>,
}

/// A fully parsed commit record: metadata plus the patches the history
/// engine applies.
#[derive(Debug, Clone)]
pub struct ParsedCommit {
    pub commit: Commit,
    pub diffs: Vec<FileDiff>,
}

pub fn parse_record(record: &RawCommitRecord) -> RipResult<ParsedCommit> {
    Parser {
        lines: &record.lines,
        idx: 0,
        sha: String::new(),
    }
    .parse()
}

struct Parser<'a> {
    lines: &'a [String],
    idx: usize,
    sha: String,
}

impl<'a> Parser<'a> {
    fn malformed(&self) -> RipError {
        RipError::MalformedCommit {
            sha: if self.sha.is_empty() {
                "?".into()
            } else {
                self.sha.clone()
            },
            offset: self.idx,
        }
    }

    fn take(&mut self, prefix: &str) -> RipResult<String> {
        let line = self.lines.get(self.idx).ok_or_else(|| self.malformed())?;
        let rest = line.strip_prefix(prefix).ok_or_else(|| self.malformed())?;
        self.idx += 1;
        Ok(rest.to_string())
    }

    fn parse(mut self) -> RipResult<ParsedCommit> {
        let sha = self.take(HDR_COMMIT)?;
        self.sha = sha.clone();
        let parents_line = self.take(HDR_PARENTS)?;
        let parents: Vec<String> = parents_line.split_whitespace().map(str::to_owned).collect();
        let author_line = self.take(HDR_AUTHOR)?;
        let (author, date) = self.parse_signature(&author_line)?;
        let committer_line = self.take(HDR_COMMITTER)?;
        let (committer, _) = self.parse_signature(&committer_line)?;
        let signed_line = self.take(HDR_SIGNED)?;
        let signed = !matches!(signed_line.as_str(), "N" | "E" | "");
        let message = self.take(HDR_MESSAGE)?;
        self.take(HDR_END)?;

        let mut sections: Vec<Section> = Vec::new();
        let mut binary_patch_skip = false;
        while self.idx < self.lines.len() {
            let line = &self.lines[self.idx];
            if line.is_empty() {
                self.idx += 1;
                continue;
            }
            if let Some(rest) = line.strip_prefix("diff --git ") {
                binary_patch_skip = false;
                sections.push(Section::new(rest.to_string()));
                self.idx += 1;
                continue;
            }
            if binary_patch_skip {
                self.idx += 1;
                continue;
            }
            let section = sections.last_mut().ok_or_else(|| {
                RipError::MalformedCommit {
                    sha: sha.clone(),
                    offset: self.idx,
                }
            })?;
            if line.starts_with("@@ -") {
                let hunk = Self::parse_hunk(self.lines, &mut self.idx, &sha)?;
                section.hunks.push(hunk);
                continue;
            }
            if section.consume_status_line(line) {
                if line == "GIT binary patch" {
                    binary_patch_skip = true;
                }
                self.idx += 1;
                continue;
            }
            return Err(self.malformed());
        }

        let mut diffs = Vec::with_capacity(sections.len());
        let mut files = HashMap::with_capacity(sections.len());
        for (n, section) in sections.into_iter().enumerate() {
            let diff = section.finish(&sha, n)?;
            files.insert(diff.path.clone(), diff.change.clone());
            diffs.push(diff);
        }

        Ok(ParsedCommit {
            commit: Commit {
                sha,
                parents,
                author,
                committer,
                date,
                message,
                files,
                branches: Vec::new(),
                signed,
            },
            diffs,
        })
    }

    fn parse_signature(&self, raw: &str) -> RipResult<(Signature, DateTime<Utc>)> {
        let lt = raw.rfind('<').ok_or_else(|| self.malformed())?;
        let gt = raw.rfind('>').ok_or_else(|| self.malformed())?;
        if gt < lt {
            return Err(self.malformed());
        }
        let name = raw[..lt].trim().to_string();
        let email = raw[lt + 1..gt].to_string();
        let mut tail = raw[gt + 1..].split_whitespace();
        let epoch: i64 = tail
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.malformed())?;
        let date = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| self.malformed())?;
        Ok((Signature { name, email }, date))
    }

    /// Consumes one hunk starting at `idx` (the `@@` header). Body lines
    /// are read until the header's old and new counts are both satisfied.
    fn parse_hunk(lines: &[String], idx: &mut usize, sha: &str) -> RipResult<Hunk> {
        let malformed = |at: usize| RipError::MalformedCommit {
            sha: sha.to_string(),
            offset: at,
        };
        let header = &lines[*idx];
        let (old_start, old_len, new_start, new_len) =
            parse_hunk_header(header).ok_or_else(|| malformed(*idx))?;
        *idx += 1;

        let mut body = Vec::with_capacity(old_len + new_len);
        let (mut seen_old, mut seen_new) = (0usize, 0usize);
        while seen_old < old_len || seen_new < new_len {
            let line = lines.get(*idx).ok_or_else(|| malformed(*idx))?;
            match line.bytes().next() {
                Some(b' ') | None => {
                    // An entirely empty line is an empty context line whose
                    // marker space was trimmed somewhere upstream.
                    body.push(HunkLine::Context);
                    seen_old += 1;
                    seen_new += 1;
                }
                Some(b'+') => {
                    body.push(HunkLine::Added(line[1..].to_string()));
                    seen_new += 1;
                }
                Some(b'-') => {
                    body.push(HunkLine::Removed);
                    seen_old += 1;
                }
                Some(b'\\') => {} // "\ No newline at end of file"
                _ => return Err(malformed(*idx)),
            }
            *idx += 1;
        }
        // A trailing no-newline marker belongs to this hunk.
        if lines.get(*idx).is_some_and(|l| l.starts_with('\\')) {
            *idx += 1;
        }
        Ok(Hunk {
            old_start,
            old_len,
            new_start,
            new_len,
            lines: body,
        })
    }
}

/// Accumulates one `diff --git` section while its status lines stream by.
#[derive(Debug)]
struct Section {
    diff_line: String,
    status: Option<CommitStatus>,
    source: Option<String>,
    target: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    binary_path: Option<String>,
    binary: bool,
    hunks: Vec<Hunk>,
}

impl Section {
    fn new(diff_line: String) -> Self {
        Self {
            diff_line,
            status: None,
            source: None,
            target: None,
            old_path: None,
            new_path: None,
            binary_path: None,
            binary: false,
            hunks: Vec::new(),
        }
    }

    /// Returns true when the line is a recognized extended header.
    fn consume_status_line(&mut self, line: &str) -> bool {
        if let Some(rest) = line.strip_prefix("rename from ") {
            self.source = Some(rest.to_string());
            self.status = Some(CommitStatus::Renamed);
            return true;
        }
        if let Some(rest) = line.strip_prefix("rename to ") {
            self.target = Some(rest.to_string());
            self.status = Some(CommitStatus::Renamed);
            return true;
        }
        if let Some(rest) = line.strip_prefix("copy from ") {
            self.source = Some(rest.to_string());
            self.status = Some(CommitStatus::Copied);
            return true;
        }
        if let Some(rest) = line.strip_prefix("copy to ") {
            self.target = Some(rest.to_string());
            self.status = Some(CommitStatus::Copied);
            return true;
        }
        if line.starts_with("new file mode ") {
            self.status = Some(CommitStatus::Added);
            return true;
        }
        if line.starts_with("deleted file mode ") {
            self.status = Some(CommitStatus::Removed);
            return true;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            self.old_path = strip_side(rest, "a/");
            return true;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            self.new_path = strip_side(rest, "b/");
            return true;
        }
        if let Some(rest) = line.strip_prefix("Binary files ") {
            self.binary = true;
            if let Some(body) = rest.strip_suffix(" differ") {
                if let Some((left, right)) = body.split_once(" and ") {
                    self.binary_path = strip_side(right, "b/").or_else(|| strip_side(left, "a/"));
                }
            }
            return true;
        }
        if line == "GIT binary patch" {
            self.binary = true;
            return true;
        }
        line.starts_with("old mode ")
            || line.starts_with("new mode ")
            || line.starts_with("similarity index ")
            || line.starts_with("dissimilarity index ")
            || line.starts_with("index ")
    }

    fn finish(self, sha: &str, offset: usize) -> RipResult<FileDiff> {
        let status = self.status.unwrap_or(CommitStatus::Modified);
        let path = self
            .target
            .clone()
            .or_else(|| self.new_path.clone())
            .or_else(|| self.old_path.clone())
            .or_else(|| self.binary_path.clone())
            .or_else(|| split_diff_line(&self.diff_line))
            .ok_or_else(|| RipError::MalformedCommit {
                sha: sha.to_string(),
                offset,
            })?;

        let additions = self
            .hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, HunkLine::Added(_)))
            .count();
        let deletions = self
            .hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, HunkLine::Removed))
            .count();

        let renamed_from = match status {
            CommitStatus::Renamed | CommitStatus::Copied => self.source,
            _ => None,
        };

        Ok(FileDiff {
            path,
            change: FileChange {
                status,
                renamed_from,
                additions,
                deletions,
                binary: self.binary,
            },
            hunks: self.hunks,
        })
    }
}

/// `a/path` -> `path`; `/dev/null` -> None.
fn strip_side(raw: &str, prefix: &str) -> Option<String> {
    if raw == "/dev/null" {
        return None;
    }
    Some(raw.strip_prefix(prefix).unwrap_or(raw).to_string())
}

/// Fallback path recovery from `a/X b/X` when no other header named the
/// file (mode-only changes). Ambiguous for paths containing ` b/`; every
/// content-bearing section is resolved from its `+++`/`---` lines first.
fn split_diff_line(rest: &str) -> Option<String> {
    let rest = rest.strip_prefix("a/")?;
    let cut = rest.rfind(" b/")?;
    Some(rest[..cut].to_string())
}
