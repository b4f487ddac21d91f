//! Export a subset of the vault to a new root with its links kept consistent.
//!
//! Phases, in order:
//!
//! 1. scan the vault, load notes on the worker pool, index every path
//! 2. select notes with [`Selection`] queries
//! 3. optionally add transitive backlinks ([`BacklinksHandler`])
//! 4. collect referenced attachments ([`discover_assets`])
//! 5. rewrite links leaving the export ([`LinkRewriter`])
//! 6. optionally normalize file names and retarget links ([`FilenameNormalizer`])
//! 7. write notes and copy attachments into the target directory
//!
//! External links are rewritten before normalization: their spans come from
//! the original bodies, and a removed link is never retargeted.

pub mod analyzer;
pub mod assets;
pub mod backlinks;
pub mod normalize;
pub mod rewriter;
pub mod selection;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use analyzer::{
    AnalyzedLink, DEFAULT_ASSET_EXTENSIONS, LinkAnalysis, LinkAnalyzer, LinkCategory,
};
pub use assets::{AssetDiscoveryResult, discover_assets};
pub use backlinks::{BacklinksDiscoveryResult, BacklinksHandler, DEFAULT_MAX_BACKLINK_DEPTH};
pub use normalize::{
    FilenameNormalizationResult, FilenameNormalizer, LinkUpdateReport, NormalizationState,
    NormalizeMode,
};
pub use rewriter::{
    ExternalLinkStrategy, LinkRewriter, RemoveStrategy, Replacement, RewriteChange, RewriteOutcome,
    StrategyKind, StrategyRegistry, UrlStrategy,
};
pub use selection::{Selection, SelectionError, SelectionQuery};

use crate::cancel::{CancelToken, Cancelled};
use crate::links::PathResolver;
use crate::pool::{ParallelFileProcessor, PoolError};
use crate::rename::FileError;
use crate::rename::writer::write_atomic;
use crate::vault::{VaultFile, VaultWalker, VaultWalkerError};

const POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Walk(#[from] VaultWalkerError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("no notes match the selection")]
    EmptySelection,

    #[error("export target is inside the vault: {0}")]
    TargetInsideVault(PathBuf),

    #[error("export target is not empty: {0} (use overwrite to write into it)")]
    TargetNotEmpty(PathBuf),

    #[error("export target is not a directory: {0}")]
    TargetNotDirectory(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub target: PathBuf,
    /// Selection queries, OR-ed. Empty selects every note.
    pub queries: Vec<String>,
    pub include_backlinks: bool,
    pub max_backlink_depth: usize,
    /// `None` keeps external links as they are.
    pub external: Option<StrategyKind>,
    pub normalize: Option<NormalizeMode>,
    pub copy_assets: bool,
    /// Overrides [`DEFAULT_ASSET_EXTENSIONS`].
    pub asset_extensions: Option<Vec<String>>,
    pub overwrite: bool,
    pub dry_run: bool,
    pub workers: usize,
    pub excluded_folders: Vec<PathBuf>,
    pub ignore: Vec<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            target: PathBuf::new(),
            queries: Vec::new(),
            include_backlinks: false,
            max_backlink_depth: DEFAULT_MAX_BACKLINK_DEPTH,
            external: None,
            normalize: None,
            copy_assets: true,
            asset_extensions: None,
            overwrite: false,
            dry_run: false,
            workers: 4,
            excluded_folders: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportResult {
    pub target: PathBuf,
    pub files_exported: usize,
    pub assets_copied: usize,
    pub external_links_removed: usize,
    pub external_links_converted: usize,
    pub internal_links_updated: usize,
    pub files_with_links_processed: usize,
    pub backlinks_included: usize,
    pub backlinks_depth_exhausted: bool,
    pub files_renamed: usize,
    /// Paths written (or that would be written), relative to the target.
    pub exported_files: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<FileError>,
    pub duration: Duration,
    pub dry_run: bool,
}

impl ExportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug)]
enum WriteJob {
    Note { path: String, content: String },
    Asset { path: String, source: PathBuf },
}

impl WriteJob {
    fn path(&self) -> &str {
        match self {
            WriteJob::Note { path, .. } | WriteJob::Asset { path, .. } => path,
        }
    }

    fn run(self, target: &Path) -> Result<(), FileError> {
        let dest = target.join(self.path());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| FileError::new(self.path(), e))?;
        }
        match self {
            WriteJob::Note { path, content } => {
                write_atomic(&dest, &content).map_err(|e| FileError::new(path, e))
            }
            WriteJob::Asset { path, source } => {
                fs::copy(&source, &dest).map(|_| ()).map_err(|e| FileError::new(path, e))
            }
        }
    }
}

/// Runs one export.
#[derive(Debug)]
pub struct Exporter {
    root: PathBuf,
    options: ExportOptions,
    cancel: CancelToken,
}

impl Exporter {
    pub fn new(root: &Path, options: ExportOptions, cancel: CancelToken) -> Self {
        Self { root: root.to_path_buf(), options, cancel }
    }

    pub fn run(&self) -> Result<ExportResult, ExportError> {
        let started = Instant::now();
        let opts = &self.options;
        let walker = VaultWalker::with_exclusions(&self.root, opts.excluded_folders.clone())?
            .with_ignore_patterns(&opts.ignore)?;
        let root = walker.root().to_path_buf();
        let target = check_target(&root, &opts.target, opts.overwrite)?;
        let selection = Selection::parse(&opts.queries)?;

        let mut result =
            ExportResult { target: target.clone(), dry_run: opts.dry_run, ..Default::default() };
        info!(target = %target.display(), dry_run = opts.dry_run, "starting export");

        // Scan and load
        let walked = walker.walk_all()?;
        let resolver = Arc::new(PathResolver::new(walked.iter().map(|f| f.relative_path.as_str())));
        let note_paths: Vec<String> = walked
            .iter()
            .filter(|f| f.is_markdown())
            .map(|f| f.relative_path.clone())
            .collect();

        let processor = ParallelFileProcessor::new(opts.workers, self.cancel.clone());
        let vault = self.load_notes(&processor, &root, note_paths, &mut result.errors)?;
        debug!(notes = vault.len(), paths = resolver.len(), "vault loaded");

        // Selection and backlinks
        let mut selected = selection.select(&vault);
        if selected.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        info!(selected = selected.len(), "notes selected");

        if opts.include_backlinks {
            let handler = BacklinksHandler::new(Arc::clone(&resolver))
                .with_max_depth(opts.max_backlink_depth);
            let found = handler.discover(&vault, &selected, &self.cancel)?;
            result.backlinks_included = found.backlinks.len();
            result.backlinks_depth_exhausted = found.depth_exhausted;
            if found.depth_exhausted {
                result.warnings.push(format!(
                    "backlink search stopped at depth {}; more notes link in further out",
                    opts.max_backlink_depth
                ));
            }
            selected.extend(found.backlinks);
        }

        let mut files: Vec<VaultFile> =
            vault.into_iter().filter(|f| selected.contains(&f.relative_path)).collect();

        let mut analyzer = LinkAnalyzer::new(Arc::clone(&resolver), selected);
        if let Some(extensions) = &opts.asset_extensions {
            analyzer = analyzer.with_asset_extensions(extensions);
        }

        // Attachments
        let assets = if opts.copy_assets {
            let found = discover_assets(&files, &analyzer);
            result.warnings.extend(found.warnings());
            found.assets
        } else {
            BTreeSet::new()
        };

        // External links; ambiguous links are reported whatever the strategy
        let mut touched = BTreeSet::new();
        let mut ambiguous = BTreeSet::new();
        let rewriter = opts.external.map(LinkRewriter::new);
        for file in &mut files {
            self.cancel.check()?;
            let analysis = analyzer.analyze_file(file);
            for link in analysis.links.iter().filter(|l| l.ambiguous) {
                ambiguous.insert((file.relative_path.clone(), link.link.target.clone()));
            }
            let Some(rewriter) = &rewriter else { continue };
            if analysis.external == 0 {
                continue;
            }
            let outcome = rewriter.rewrite_file_content(file, &analysis);
            if outcome.changes > 0 {
                result.external_links_removed += outcome.removed;
                result.external_links_converted += outcome.converted;
                touched.insert(file.relative_path.clone());
                file.set_body(outcome.body);
            }
        }
        if rewriter.is_some() {
            info!(
                removed = result.external_links_removed,
                converted = result.external_links_converted,
                "external links rewritten"
            );
        }

        // File names
        if let Some(mode) = opts.normalize {
            let normalizer = FilenameNormalizer::new(mode);
            let paths: Vec<String> = files.iter().map(|f| f.relative_path.clone()).collect();
            let renamed = normalizer.normalize(&paths);
            let bodies_before: Vec<String> = files.iter().map(|f| f.body().to_string()).collect();
            let report = normalizer.update_file_links(&mut files, &renamed, Arc::clone(&resolver));
            result.internal_links_updated = report.links_updated;
            result.files_renamed = renamed.files_renamed();
            ambiguous.extend(report.ambiguous);
            for ((file, before), old_path) in files.iter().zip(&bodies_before).zip(&paths) {
                if file.body() != before {
                    touched.insert(old_path.clone());
                }
            }
            info!(
                renamed = result.files_renamed,
                links = result.internal_links_updated,
                "file names normalized"
            );
        }
        for (file, target) in ambiguous {
            warn!(file = %file, link = %target, "ambiguous link");
            result.warnings.push(format!("{file}: ambiguous link '{target}'"));
        }
        result.files_with_links_processed = touched.len();

        // Write
        result.files_exported = files.len();
        result.assets_copied = assets.len();
        result.exported_files = files.iter().map(|f| f.relative_path.clone()).collect();

        if opts.dry_run {
            if let Err(e) = processor.shutdown(POOL_SHUTDOWN_TIMEOUT) {
                warn!(error = %e, "worker pool did not stop cleanly");
            }
            result.duration = started.elapsed();
            info!(files = result.files_exported, assets = result.assets_copied, "dry run complete");
            return Ok(result);
        }

        fs::create_dir_all(&target)
            .map_err(|source| ExportError::Io { path: target.clone(), source })?;
        let jobs: Vec<WriteJob> = files
            .iter()
            .map(|f| WriteJob::Note { path: f.relative_path.clone(), content: f.render() })
            .chain(assets.iter().map(|a| WriteJob::Asset { path: a.clone(), source: root.join(a) }))
            .collect();
        let job_paths: Vec<String> = jobs.iter().map(|j| j.path().to_string()).collect();

        let write_target = target.clone();
        let outcomes = processor.process(jobs, move |job: WriteJob| job.run(&write_target));
        if let Err(e) = processor.shutdown(POOL_SHUTDOWN_TIMEOUT) {
            warn!(error = %e, "worker pool did not stop cleanly");
        }

        let mut failed_notes = 0;
        let mut failed_assets = 0;
        for (index, (path, outcome)) in job_paths.iter().zip(outcomes).enumerate() {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(PoolError::Cancelled(c)) => return Err(c.into()),
                Err(e) => FileError::new(path.as_str(), e),
            };
            warn!(file = %error.path, error = %error.message, "export write failed");
            if index < files.len() { failed_notes += 1 } else { failed_assets += 1 }
            result.errors.push(error);
        }
        result.files_exported -= failed_notes;
        result.assets_copied -= failed_assets;

        result.duration = started.elapsed();
        info!(
            files = result.files_exported,
            assets = result.assets_copied,
            errors = result.errors.len(),
            "export complete"
        );
        Ok(result)
    }

    fn load_notes(
        &self,
        processor: &ParallelFileProcessor,
        root: &Path,
        paths: Vec<String>,
        errors: &mut Vec<FileError>,
    ) -> Result<Vec<VaultFile>, ExportError> {
        let task_root = root.to_path_buf();
        let loaded = processor.process(paths.clone(), move |relative: String| {
            VaultFile::load(&task_root, &task_root.join(&relative))
        });

        let mut files = Vec::with_capacity(loaded.len());
        for (relative, outcome) in paths.iter().zip(loaded) {
            match outcome {
                Ok(Ok(file)) => files.push(file),
                Ok(Err(e)) => {
                    warn!(file = %relative, error = %e, "skipping unreadable note");
                    errors.push(FileError::new(relative.as_str(), e));
                }
                Err(PoolError::Cancelled(c)) => return Err(c.into()),
                Err(e) => errors.push(FileError::new(relative.as_str(), e)),
            }
        }
        Ok(files)
    }
}

/// Absolute target directory, refusing locations inside the vault and
/// non-empty directories unless `overwrite` is set.
fn check_target(root: &Path, target: &Path, overwrite: bool) -> Result<PathBuf, ExportError> {
    let absolute = std::path::absolute(target)
        .map_err(|source| ExportError::Io { path: target.to_path_buf(), source })?;
    let absolute = absolute.canonicalize().unwrap_or(absolute);

    if absolute.starts_with(root) {
        return Err(ExportError::TargetInsideVault(absolute));
    }
    if absolute.exists() && !absolute.is_dir() {
        return Err(ExportError::TargetNotDirectory(absolute));
    }
    if absolute.is_dir() && !overwrite {
        let mut entries = fs::read_dir(&absolute)
            .map_err(|source| ExportError::Io { path: absolute.clone(), source })?;
        if entries.next().is_some() {
            return Err(ExportError::TargetNotEmpty(absolute));
        }
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn export(vault: &TempDir, out: &TempDir, options: ExportOptions) -> ExportResult {
        let options = ExportOptions { target: out.path().join("export"), ..options };
        Exporter::new(vault.path(), options, CancelToken::new()).run().unwrap()
    }

    fn read(out: &TempDir, rel: &str) -> String {
        fs::read_to_string(out.path().join("export").join(rel)).unwrap()
    }

    #[test]
    fn test_remove_strategy_example() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "note1.md", "Links to [[missing note]].");
        write(vault.path(), "note2.md", "unrelated");
        let out = TempDir::new().unwrap();

        let result = export(
            &vault,
            &out,
            ExportOptions {
                queries: vec!["note1.md".into()],
                external: Some(StrategyKind::Remove),
                ..Default::default()
            },
        );

        assert_eq!(read(&out, "note1.md"), "Links to missing note.");
        assert_eq!(result.external_links_removed, 1);
        assert_eq!(result.files_exported, 1);
        assert_eq!(result.files_with_links_processed, 1);
        assert!(!out.path().join("export/note2.md").exists());
    }

    #[test]
    fn test_url_strategy_example() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "note1.md", "---\nurl: https://x.com\n---\n[[missing note]]");
        let out = TempDir::new().unwrap();

        let result = export(
            &vault,
            &out,
            ExportOptions {
                queries: vec!["note1.md".into()],
                external: Some(StrategyKind::Url),
                ..Default::default()
            },
        );

        assert_eq!(
            read(&out, "note1.md"),
            "---\nurl: https://x.com\n---\n[missing note](https://x.com)"
        );
        assert_eq!(result.external_links_converted, 1);
        assert_eq!(result.external_links_removed, 0);
    }

    #[test]
    fn test_keep_strategy_leaves_links() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a.md", "[[b]] [[elsewhere]]");
        write(vault.path(), "b.md", "");
        let out = TempDir::new().unwrap();

        let result = export(&vault, &out, ExportOptions::default());

        assert_eq!(read(&out, "a.md"), "[[b]] [[elsewhere]]");
        assert_eq!(result.files_exported, 2);
        assert_eq!(result.files_with_links_processed, 0);
    }

    #[test]
    fn test_ambiguous_links_are_reported() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a/dup.md", "");
        write(vault.path(), "b/dup.md", "");
        write(vault.path(), "note1.md", "see [[dup]]");

        for external in [Some(StrategyKind::Remove), None] {
            let out = TempDir::new().unwrap();
            let options =
                ExportOptions { queries: vec!["note1.md".into()], external, ..Default::default() };
            let result = export(&vault, &out, options);

            assert_eq!(
                result.warnings,
                vec!["note1.md: ambiguous link 'dup'"],
                "strategy {external:?}"
            );
        }
    }

    #[test]
    fn test_backlinks_and_assets_are_exported() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "topic.md", "![[diagram.png]] ![[lost.png]]");
        write(vault.path(), "refs/citing.md", "see [[topic]]");
        write(vault.path(), "other.md", "nothing");
        write(vault.path(), "attachments/diagram.png", "PNG");
        let out = TempDir::new().unwrap();

        let result = export(
            &vault,
            &out,
            ExportOptions {
                queries: vec!["topic.md".into()],
                include_backlinks: true,
                ..Default::default()
            },
        );

        assert_eq!(result.backlinks_included, 1);
        assert_eq!(result.exported_files, vec!["refs/citing.md", "topic.md"]);
        assert_eq!(result.assets_copied, 1);
        assert_eq!(read(&out, "attachments/diagram.png"), "PNG");
        assert_eq!(result.warnings, vec!["topic.md: missing asset 'lost.png'"]);
    }

    #[test]
    fn test_flatten_and_slugify() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "projects/Big Plan.md", "Next: [[Small Step]] and [x](../Gone.md)");
        write(vault.path(), "projects/tasks/Small Step.md", "Back to [plan](../Big%20Plan.md)");
        let out = TempDir::new().unwrap();

        let result = export(
            &vault,
            &out,
            ExportOptions {
                normalize: Some(NormalizeMode::SlugifyFlatten),
                external: Some(StrategyKind::Remove),
                ..Default::default()
            },
        );

        assert_eq!(result.files_renamed, 2);
        assert_eq!(result.external_links_removed, 1);
        assert_eq!(read(&out, "big-plan.md"), "Next: [[small-step]] and x");
        assert_eq!(read(&out, "small-step.md"), "Back to [plan](big-plan.md)");
        assert_eq!(result.internal_links_updated, 2);
        assert_eq!(result.files_with_links_processed, 2);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a.md", "[[gone]]");
        let out = TempDir::new().unwrap();

        let result = export(
            &vault,
            &out,
            ExportOptions {
                dry_run: true,
                external: Some(StrategyKind::Remove),
                ..Default::default()
            },
        );

        assert!(result.dry_run);
        assert_eq!(result.files_exported, 1);
        assert_eq!(result.external_links_removed, 1);
        assert!(!out.path().join("export").exists());
    }

    #[test]
    fn test_target_rules() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a.md", "");
        let out = TempDir::new().unwrap();
        write(out.path(), "export/existing.txt", "x");

        let options = ExportOptions { target: out.path().join("export"), ..Default::default() };
        let err =
            Exporter::new(vault.path(), options.clone(), CancelToken::new()).run().unwrap_err();
        assert!(matches!(err, ExportError::TargetNotEmpty(_)));

        let overwrite = ExportOptions { overwrite: true, ..options };
        assert!(Exporter::new(vault.path(), overwrite, CancelToken::new()).run().is_ok());

        let inside = ExportOptions { target: vault.path().join("out"), ..Default::default() };
        let err = Exporter::new(vault.path(), inside, CancelToken::new()).run().unwrap_err();
        assert!(matches!(err, ExportError::TargetInsideVault(_)));
    }

    #[test]
    fn test_empty_selection() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a.md", "");
        let out = TempDir::new().unwrap();
        let options = ExportOptions {
            target: out.path().join("x"),
            queries: vec!["tag:none".into()],
            ..Default::default()
        };

        let err = Exporter::new(vault.path(), options, CancelToken::new()).run().unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));
    }

    #[test]
    fn test_cancelled_export() {
        let vault = TempDir::new().unwrap();
        write(vault.path(), "a.md", "");
        let out = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = ExportOptions { target: out.path().join("x"), ..Default::default() };

        let err = Exporter::new(vault.path(), options, cancel).run().unwrap_err();
        assert!(matches!(err, ExportError::Cancelled(_)));
    }
}
