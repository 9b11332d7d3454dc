//! CLI command definition and handlers
//!
//! Discovery rules: a directory with a `.git` child is a repository; a
//! `*.git` directory containing `objects` is a bare repository; anything
//! else is searched one level down. Empty repositories are skipped with a
//! warning rather than failing the whole run.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use crossbeam_channel::bounded;
use regex::Regex;
use tracing::warn;

use crate::error::RipError;
use crate::models::BlameResult;
use crate::ripper::{RipOpts, Ripper};

/// Repoblame - per-commit blame, language and license analysis
///
/// Walks the full history of one or more git repositories and prints one
/// record per (commit, file) pair.
#[derive(Parser, Debug)]
#[command(name = "repoblame")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Repository, or a directory containing repositories one level down
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Only emit results whose path matches this regex
    #[arg(long)]
    pub include: Option<String>,

    /// Skip results whose path matches this regex
    #[arg(long)]
    pub exclude: Option<String>,

    /// Process all branches and attribute commits to them
    /// (default: first-parent history of HEAD)
    #[arg(long)]
    pub all_branches: bool,

    /// Start emitting from this commit (inclusive)
    #[arg(long)]
    pub commit_from: Option<String>,

    /// Directory for incremental resume checkpoints
    #[arg(long)]
    pub checkpoints_dir: Option<PathBuf>,

    /// Use a checkpoint even when it does not match --commit-from
    #[arg(long)]
    pub no_strict_resume: bool,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub fn run(cli: Cli) -> Result<()> {
    let include = cli
        .include
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --include regex")?;
    let exclude = cli
        .exclude
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --exclude regex")?;

    let repos = discover_repos(&cli.dir, 1)?;
    if repos.is_empty() {
        bail!("no git repos found in supplied dir: {}", cli.dir.display());
    }

    let mut entries = 0usize;
    let mut skipped_empty = 0usize;
    let mut repo_errors: Vec<(PathBuf, RipError)> = Vec::new();

    for repo in &repos {
        eprintln!(
            "starting processing repo: {}",
            style(repo.display()).green()
        );
        match run_on_repo(repo, &cli, include.clone(), exclude.clone()) {
            Ok(count) => entries += count,
            Err(RipError::NoHead) => {
                warn!(repo = %repo.display(), "no HEAD commit, skipping empty repo");
                skipped_empty += 1;
            }
            Err(e) => repo_errors.push((repo.clone(), e)),
        }
    }

    if !repo_errors.is_empty() {
        for (repo, err) in &repo_errors {
            eprintln!(
                "{}",
                style(format!("repo: {} err: {err}", repo.display())).red()
            );
        }
        bail!("failed processing");
    }
    if skipped_empty != 0 {
        eprintln!(
            "{}",
            style(format!("Warning! Skipped {skipped_empty} empty repos")).yellow()
        );
    }
    eprintln!(
        "{}",
        style(format!(
            "Finished processing {} repos, {entries} entries",
            repos.len() - skipped_empty
        ))
        .green()
    );
    Ok(())
}

fn run_on_repo(
    repo: &Path,
    cli: &Cli,
    include: Option<Regex>,
    exclude: Option<Regex>,
) -> Result<usize, RipError> {
    let opts = RipOpts {
        all_branches: cli.all_branches,
        commit_from_incl: cli.commit_from.clone(),
        checkpoints_dir: cli.checkpoints_dir.clone(),
        no_strict_resume: cli.no_strict_resume,
    };

    let (tx, rx) = bounded::<BlameResult>(128);
    let as_json = cli.format == "json";
    let printer = thread::spawn(move || {
        let mut count = 0usize;
        for result in rx {
            if include
                .as_ref()
                .is_some_and(|re| !re.is_match(&result.filename))
            {
                continue;
            }
            if exclude
                .as_ref()
                .is_some_and(|re| re.is_match(&result.filename))
            {
                continue;
            }
            print_result(&result, as_json);
            count += 1;
        }
        count
    });

    let run = Ripper::new().rip(repo, tx, &opts);
    let count = printer.join().expect("printer thread panicked");
    run.map(|()| count)
}

fn print_result(result: &BlameResult, as_json: bool) {
    if as_json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize result"),
        }
        return;
    }
    let license = result
        .license
        .as_ref()
        .map(|l| format!("{} ({:.0}%)", l.name, 100.0 * l.confidence))
        .unwrap_or_default();
    println!(
        "[{}] {} language={},license={},loc={},sloc={},comments={},blanks={},complexity={},skipped={},status={},author={}",
        style(&result.commit.sha[..8]).cyan(),
        style(&result.filename).green(),
        style(&result.language).magenta(),
        license,
        result.loc,
        style(result.sloc).yellow(),
        result.comments,
        result.blanks,
        result.complexity,
        result.skipped.as_deref().unwrap_or_default(),
        result.status,
        result.commit.author,
    );
}

/// Finds repositories under `dir`, recursing at most `levels` deep.
fn discover_repos(dir: &Path, levels: usize) -> Result<Vec<PathBuf>> {
    let meta = fs::metadata(dir)
        .with_context(|| format!("can't stat passed dir: {}", dir.display()))?;
    if !meta.is_dir() {
        bail!("passed dir is a file, expecting a dir: {}", dir.display());
    }
    if dir.join(".git").is_dir() {
        return Ok(vec![dir.to_path_buf()]);
    }
    // Bare repositories: dir named *.git with an objects dir inside.
    if dir.extension().is_some_and(|ext| ext == "git") && dir.join("objects").is_dir() {
        return Ok(vec![dir.to_path_buf()]);
    }
    if levels == 0 {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("can't read passed dir: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            found.extend(discover_repos(&path, levels - 1)?);
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_worktree_repo() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let found = discover_repos(dir.path(), 1).unwrap();
        assert_eq!(found, vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn discovers_bare_repo_one_level_down() {
        let dir = tempdir().unwrap();
        let bare = dir.path().join("project.git");
        fs::create_dir_all(bare.join("objects")).unwrap();
        let found = discover_repos(dir.path(), 1).unwrap();
        assert_eq!(found, vec![bare]);
    }

    #[test]
    fn does_not_recurse_past_one_level() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/.git")).unwrap();
        let found = discover_repos(dir.path(), 1).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "repoblame",
            "/tmp/repo",
            "--all-branches",
            "--include",
            r"\.rs$",
            "--format",
            "json",
        ]);
        assert!(cli.all_branches);
        assert_eq!(cli.dir, PathBuf::from("/tmp/repo"));
        assert_eq!(cli.include.as_deref(), Some(r"\.rs$"));
        assert_eq!(cli.format, "json");
    }
}
