//! Rename and move files while keeping every link to them intact.
//!
//! A rename runs in phases: candidate search (external tool or full scan),
//! parallel matching on the worker pool, then either a dry-run report or a
//! sequential commit of atomic writes followed by a two-step filesystem
//! rename through staging siblings.
//!
//! Link updates are not rolled back: if the rename fails after they were
//! written, staged files go back to their sources and the updated links point
//! at paths that do not exist yet.

pub mod matcher;
pub mod search;
pub mod types;
pub mod writer;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub use search::{SearchConfig, SearchError};
pub use types::*;

use crate::cancel::CancelToken;
use crate::links::resolver::{
    basename, clean_path, extension, is_markdown_path, join, strip_extension,
};
use crate::links::updater::duplicate_destinations;
use crate::links::{FileMove, LinkUpdater, PathResolver};
use crate::pool::{ParallelFileProcessor, PoolError};
use crate::vault::VaultWalker;

use matcher::{FileMatch, match_file};
use search::find_candidates;
use writer::write_atomic;

const POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives renames of one or more files within a vault.
#[derive(Debug)]
pub struct RenameProcessor {
    root: PathBuf,
    options: RenameOptions,
    cancel: CancelToken,
}

impl RenameProcessor {
    pub fn new(root: &Path, options: RenameOptions, cancel: CancelToken) -> Self {
        Self { root: root.to_path_buf(), options, cancel }
    }

    pub fn rename(&self, mv: FileMove) -> Result<RenameResult, RenameError> {
        self.rename_batch(vec![mv])
    }

    pub fn rename_batch(&self, moves: Vec<FileMove>) -> Result<RenameResult, RenameError> {
        let started = Instant::now();
        let walker =
            VaultWalker::with_exclusions(&self.root, self.options.excluded_folders.clone())?
                .with_ignore_patterns(&self.options.ignore)?;
        let root = walker.root().to_path_buf();

        let moves = validate_moves(&root, moves)?;
        info!(moves = moves.len(), dry_run = self.options.dry_run, "starting rename");

        let vault_paths: Vec<String> =
            walker.walk_all()?.into_iter().map(|f| f.relative_path).collect();
        let resolver = Arc::new(PathResolver::new(&vault_paths));
        let mut warnings = name_clash_warnings(&resolver, &moves);

        // Candidate search
        let (candidates, candidate_source) =
            find_candidates(&walker, &moves, &self.options.search, &self.cancel)?;
        info!(candidates = candidates.len(), source = ?candidate_source, "candidates selected");

        // Parallel match
        let updater = Arc::new(LinkUpdater::new(&moves).with_resolver(resolver));
        let processor = ParallelFileProcessor::new(self.options.workers, self.cancel.clone());
        let task_root = root.clone();
        let results = processor.process(candidates.clone(), move |relative: String| {
            match_file(&task_root, &relative, &updater)
        });
        if let Err(e) = processor.shutdown(POOL_SHUTDOWN_TIMEOUT) {
            warn!(error = %e, "worker pool did not stop cleanly");
        }

        let mut errors = Vec::new();
        let mut matched: Vec<FileMatch> = Vec::new();
        for (relative, result) in candidates.iter().zip(results) {
            let error = match result {
                Ok(Ok(found)) => {
                    for target in &found.ambiguous {
                        warnings.push(format!(
                            "{}: ambiguous link '{}' left unchanged",
                            found.path, target
                        ));
                    }
                    matched.push(found);
                    continue;
                }
                Ok(Err(file_error)) => file_error,
                Err(PoolError::Cancelled(c)) => return Err(c.into()),
                Err(e) => FileError::new(relative.as_str(), e),
            };
            if self.options.stop_on_error {
                return Err(RenameError::Aborted { path: error.path, message: error.message });
            }
            warn!(file = %error.path, error = %error.message, "skipping file");
            errors.push(error);
        }

        let changed: Vec<&FileMatch> = matched.iter().filter(|m| m.content.is_some()).collect();
        let mut result = RenameResult {
            source_path: moves[0].from.clone(),
            target_path: moves[0].to.clone(),
            files_scanned: candidates.len(),
            files_modified: changed.len(),
            links_updated: changed.iter().map(|m| m.links_updated).sum(),
            modified_files: changed.iter().map(|m| m.path.clone()).collect(),
            duration: Duration::ZERO,
            errors,
            warnings,
            dry_run: self.options.dry_run,
            candidate_source,
        };

        if self.options.dry_run {
            result.duration = started.elapsed();
            info!(files = result.files_modified, links = result.links_updated, "dry run complete");
            return Ok(result);
        }

        // Commit: writes first, renames only if every write landed
        let mut write_failures = 0;
        for found in &changed {
            self.cancel.check()?;
            let Some(content) = &found.content else { continue };
            let path = root.join(&found.path);
            if let Err(e) = write_atomic(&path, content) {
                let error = FileError::new(found.path.as_str(), &e);
                if self.options.stop_on_error {
                    return Err(RenameError::Aborted { path: error.path, message: error.message });
                }
                warn!(file = %found.path, error = %e, "write failed");
                result.errors.push(error);
                write_failures += 1;
            } else {
                debug!(file = %found.path, "written");
            }
        }

        if write_failures > 0 {
            result.warnings.push(format!(
                "{write_failures} file(s) could not be written; files were not renamed"
            ));
            result.duration = started.elapsed();
            return Ok(result);
        }

        commit_moves(&root, &moves)?;

        result.duration = started.elapsed();
        Ok(result)
    }
}

/// Rename every source to a staging sibling first, then every staged file to
/// its destination, so chains (`a -> b`, `b -> c`) and swaps never clobber a
/// source that has not moved yet.
fn commit_moves(root: &Path, moves: &[FileMove]) -> Result<(), RenameError> {
    let mut staged: Vec<(PathBuf, &FileMove)> = Vec::with_capacity(moves.len());

    for (i, mv) in moves.iter().enumerate() {
        let from = root.join(&mv.from);
        let temp = staging_path(&from, i);
        if let Err(source) = fs::rename(&from, &temp) {
            unstage(root, &staged);
            return Err(rename_error(mv, source));
        }
        debug!(from = %mv.from, staged = %temp.display(), "staged");
        staged.push((temp, mv));
    }

    for (done, (temp, mv)) in staged.iter().enumerate() {
        let to = root.join(&mv.to);
        let placed = match to.parent() {
            Some(parent) if !parent.exists() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|()| fs::rename(temp, &to));
        if let Err(source) = placed {
            unstage(root, &staged[done..]);
            return Err(rename_error(mv, source));
        }
        info!(from = %mv.from, to = %mv.to, "renamed");
    }
    Ok(())
}

fn rename_error(mv: &FileMove, source: std::io::Error) -> RenameError {
    RenameError::RenameError { from: mv.from.clone(), to: mv.to.clone(), source }
}

fn staging_path(from: &Path, index: usize) -> PathBuf {
    let name = from.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    from.with_file_name(format!(".{name}.vaultlink-{}-{index}.tmp", std::process::id()))
}

/// Put staged files back at their sources after a failed commit.
fn unstage(root: &Path, staged: &[(PathBuf, &FileMove)]) {
    for (temp, mv) in staged {
        if let Err(e) = fs::rename(temp, root.join(&mv.from)) {
            warn!(
                file = %mv.from,
                staged = %temp.display(),
                error = %e,
                "could not restore staged file"
            );
        }
    }
}

/// Normalize a batch: vault-relative paths, directory destinations expanded,
/// extension kept, sources present, destinations free and distinct.
fn validate_moves(root: &Path, moves: Vec<FileMove>) -> Result<Vec<FileMove>, RenameError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(moves.len());

    for mv in moves {
        let from = vault_relative(root, &mv.from)
            .ok_or_else(|| RenameError::InvalidPath(mv.from.clone()))?;
        let mut to =
            vault_relative(root, &mv.to).ok_or_else(|| RenameError::InvalidPath(mv.to.clone()))?;

        if mv.to.ends_with('/') || root.join(&to).is_dir() {
            to = join(&to, basename(&from));
        } else if extension(&to).is_none() && let Some(ext) = extension(&from) {
            to = format!("{to}.{ext}");
        }

        if !root.join(&from).is_file() {
            return Err(RenameError::SourceNotFound(root.join(&from)));
        }
        if !seen.insert(from.clone()) {
            return Err(RenameError::DuplicateSource(from));
        }
        normalized.push(FileMove { from, to });
    }

    if normalized.is_empty() {
        return Err(RenameError::InvalidPath("no files to rename".to_string()));
    }

    if let Some(dup) = duplicate_destinations(&normalized).into_iter().next() {
        return Err(RenameError::TargetExists(root.join(dup)));
    }
    for mv in &normalized {
        let target = root.join(&mv.to);
        if target.exists() && !seen.contains(&mv.to) && !same_file(&root.join(&mv.from), &target) {
            return Err(RenameError::TargetExists(target));
        }
    }

    Ok(normalized)
}

/// True when both paths name one file, as a case-only rename does on a
/// case-insensitive filesystem.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Vault-relative form of a user-supplied path (absolute or relative).
fn vault_relative(root: &Path, path: &str) -> Option<String> {
    let as_path = Path::new(path);
    if as_path.is_absolute() {
        let stripped = as_path.strip_prefix(root).ok()?;
        return clean_path(&stripped.to_string_lossy());
    }
    clean_path(path)
}

fn name_clash_warnings(resolver: &PathResolver, moves: &[FileMove]) -> Vec<String> {
    let moved: HashSet<&str> = moves.iter().map(|m| m.from.as_str()).collect();
    moves
        .iter()
        .filter(|mv| is_markdown_path(&mv.to))
        .filter_map(|mv| {
            let name = strip_extension(basename(&mv.to));
            let clashes =
                resolver.notes_named(name).iter().filter(|p| !moved.contains(p.as_str())).count();
            (clashes > 0).then(|| {
                format!(
                    "{clashes} existing note(s) share the name '{name}'; \
                     basename links may become ambiguous"
                )
            })
        })
        .collect()
}
