//! Candidate pre-filtering with an external search tool.
//!
//! Only files mentioning a moved file's name can hold a link to it, so a fast
//! grep narrows the set before any file is parsed. Any failure of the tool
//! falls back to scanning every markdown file.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::types::CandidateSource;
use crate::cancel::{CancelToken, Cancelled};
use crate::links::FileMove;
use crate::links::encoding::encoded_variants;
use crate::links::resolver::{basename, clean_path, is_markdown_path, strip_extension};
use crate::vault::VaultWalker;

pub const DEFAULT_SEARCH_TOOL: &str = "rg";
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search tool '{tool}' is not available: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("search tool exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("search timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub tool: String,
    pub timeout: Duration,
    pub enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tool: DEFAULT_SEARCH_TOOL.to_string(),
            timeout: DEFAULT_SEARCH_TIMEOUT,
            enabled: true,
        }
    }
}

/// Regex matching a link opener followed, on the same line, by any spelling
/// of a moved file's name.
pub fn search_pattern(moves: &[FileMove]) -> String {
    let mut names = BTreeSet::new();
    for mv in moves {
        let name = basename(&mv.from);
        let stem = if is_markdown_path(name) { strip_extension(name) } else { name };
        names.insert(stem.to_string());
        names.insert(stem.replace(' ', "_"));
        names.insert(stem.replace('_', " "));
        names.extend(encoded_variants(stem));
        names.insert(urlencoding::encode(stem).into_owned());
    }

    let alternatives = names
        .iter()
        .filter(|n| !n.is_empty())
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    format!(r"(\[\[|\]\()[^\n]*({alternatives})")
}

/// Run the search tool in `root`. Returns vault-relative paths of matching
/// markdown files. Exit status 1 means "no matches" and yields an empty set.
pub fn run_search(
    root: &Path,
    pattern: &str,
    config: &SearchConfig,
    cancel: &CancelToken,
) -> Result<Vec<String>, SearchError> {
    let mut child = Command::new(&config.tool)
        .args(["--files-with-matches", "--ignore-case", "--no-messages", "--hidden", "--no-ignore"])
        .args(["--iglob", "*.md", "-e", pattern])
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SearchError::ToolUnavailable { tool: config.tool.clone(), source })?;

    // Drain pipes on their own threads so a large result cannot block the child
    let stdout = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = out.read_to_string(&mut buf);
            buf
        })
    });
    let stderr = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = err.read_to_string(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        if let Err(cancelled) = cancel.check() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(cancelled.into());
        }
        if started.elapsed() >= config.timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SearchError::TimedOut(config.timeout));
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(source) => {
                return Err(SearchError::ToolUnavailable { tool: config.tool.clone(), source });
            }
        }
    };

    let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

    match status.code() {
        Some(0) => Ok(stdout
            .lines()
            .filter_map(|line| clean_path(line.trim().trim_start_matches("./")))
            .filter(|p| is_markdown_path(p))
            .collect()),
        Some(1) => Ok(Vec::new()),
        code => Err(SearchError::Failed { code, stderr: stderr.trim().to_string() }),
    }
}

/// Files to examine for a batch of moves, plus where the list came from.
///
/// Search results are filtered through the walker's rules so both sources see
/// the same files. The moved files themselves are always included.
pub fn find_candidates(
    walker: &VaultWalker,
    moves: &[FileMove],
    config: &SearchConfig,
    cancel: &CancelToken,
) -> Result<(Vec<String>, CandidateSource), crate::rename::RenameError> {
    if config.enabled {
        let pattern = search_pattern(moves);
        match run_search(walker.root(), &pattern, config, cancel) {
            Ok(found) => {
                let mut candidates: BTreeSet<String> =
                    found.into_iter().filter(|p| walker.accepts(p)).collect();
                let moved_notes = moves.iter().filter(|m| is_markdown_path(&m.from));
                candidates.extend(moved_notes.map(|m| m.from.clone()));
                debug!(
                    candidates = candidates.len(),
                    tool = %config.tool,
                    "search narrowed candidates"
                );
                return Ok((candidates.into_iter().collect(), CandidateSource::Search));
            }
            Err(SearchError::Cancelled(c)) => return Err(c.into()),
            Err(e) => warn!(error = %e, "search tool failed, scanning the whole vault"),
        }
    }

    cancel.check()?;
    let files = walker.walk()?;
    Ok((files.into_iter().map(|f| f.relative_path).collect(), CandidateSource::FullScan))
}
