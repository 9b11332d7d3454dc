//! Per-emission decoration
//!
//! Turns an engine emission into the public `BlameResult`: language
//! detection, line classification, code metrics, and license detection,
//! all computed from the reconstructed content. Stateless per emission,
//! so the ripper runs a pool of these in parallel; the language cache is
//! the only shared piece.

pub mod langs;
pub mod license;

use dashmap::DashMap;

use crate::engine::Emission;
use crate::models::{BlameLine, BlameResult};

use langs::LangSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Code,
    Comment,
    Blank,
}

/// Decorates emissions with language, license and metrics.
#[derive(Default)]
pub struct FileInfo {
    /// Path -> detected language, shared across the decorator pool.
    lang_cache: DashMap<String, Option<&'static LangSpec>>,
}

impl FileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decorate(&self, emission: &Emission) -> BlameResult {
        let commit = (*emission.commit).clone();

        if emission.lines.is_empty() {
            return BlameResult {
                commit,
                filename: emission.filename.clone(),
                lines: Vec::new(),
                size: 0,
                loc: 0,
                sloc: 0,
                comments: 0,
                blanks: 0,
                complexity: 0,
                weighted_complexity: 0.0,
                language: String::new(),
                license: None,
                skipped: emission.skipped.clone(),
                status: emission.status,
            };
        }

        let first_line = emission
            .lines
            .first()
            .map(|l| &*l.text)
            .unwrap_or_default();
        let lang = self.language_for(&emission.filename, first_line);

        let mut lines = Vec::with_capacity(emission.lines.len());
        let mut size = 0u64;
        let (mut blanks, mut comments, mut complexity) = (0u64, 0u64, 0u64);
        let mut in_block = false;

        for line in &emission.lines {
            size += line.text.len() as u64 + 1;
            let kind = classify(&line.text, lang, &mut in_block);
            match kind {
                LineKind::Blank => blanks += 1,
                LineKind::Comment => comments += 1,
                LineKind::Code => {
                    if let Some(spec) = lang {
                        complexity += branch_tokens(&line.text, spec);
                    }
                }
            }
            lines.push(BlameLine {
                name: line.sig.name.clone(),
                email: line.sig.email.clone(),
                date: line.sig.date,
                comment: kind == LineKind::Comment,
                code: kind == LineKind::Code,
                blank: kind == LineKind::Blank,
            });
        }

        let loc = lines.len() as u64;
        let sloc = loc - blanks - comments;
        let weighted_complexity = if sloc > 0 {
            complexity as f64 * 100.0 / sloc as f64
        } else {
            0.0
        };

        let head: String = emission
            .lines
            .iter()
            .take(license::HEAD_LINES)
            .map(|l| &*l.text)
            .collect::<Vec<_>>()
            .join("\n");
        let license = license::detect(&emission.filename, &head);

        BlameResult {
            commit,
            filename: emission.filename.clone(),
            lines,
            size,
            loc,
            sloc,
            comments,
            blanks,
            complexity,
            weighted_complexity,
            language: lang.map(|l| l.name.to_string()).unwrap_or_default(),
            license,
            skipped: emission.skipped.clone(),
            status: emission.status,
        }
    }

    fn language_for(&self, path: &str, first_line: &str) -> Option<&'static LangSpec> {
        if let Some(cached) = self.lang_cache.get(path) {
            return *cached;
        }
        let detected = langs::detect(path, first_line);
        self.lang_cache.insert(path.to_string(), detected);
        detected
    }
}

/// Classifies one line. Block comment state threads through the file top
/// to bottom; a trailing comment after code still counts the line as
/// code.
fn classify(text: &str, lang: Option<&'static LangSpec>, in_block: &mut bool) -> LineKind {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    let Some(spec) = lang else {
        return LineKind::Code;
    };
    if *in_block {
        if let Some((_, close)) = spec.block_comment {
            if trimmed.contains(close) {
                *in_block = false;
            }
        }
        return LineKind::Comment;
    }
    if spec.line_comments.iter().any(|p| trimmed.starts_with(p)) {
        return LineKind::Comment;
    }
    if let Some((open, close)) = spec.block_comment {
        if let Some(rest) = trimmed.strip_prefix(open) {
            if !rest.contains(close) {
                *in_block = true;
            }
            return LineKind::Comment;
        }
    }
    LineKind::Code
}

fn branch_tokens(text: &str, spec: &LangSpec) -> u64 {
    spec.complexity_tokens
        .iter()
        .map(|t| text.matches(t).count() as u64)
        .sum()
}
