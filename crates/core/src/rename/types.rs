//! Data structures for the rename pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::search::SearchConfig;
use crate::cancel::Cancelled;
use crate::vault::VaultWalkerError;

/// Errors that abort a rename operation
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("target file already exists: {0}")]
    TargetExists(PathBuf),

    #[error("file is moved more than once in one batch: {0}")]
    DuplicateSource(String),

    #[error("invalid vault path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Walk(#[from] VaultWalkerError),

    #[error("failed to read file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to rename {from} to {to}: {source}")]
    RenameError {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("aborted after error in {path}: {message}")]
    Aborted { path: String, message: String },
}

/// A failure confined to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<String>, message: impl ToString) -> Self {
        Self { path: path.into(), message: message.to_string() }
    }
}

/// Where the files to examine came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Pre-filtered by the external search tool.
    Search,
    /// Every markdown file in the vault.
    FullScan,
}

#[derive(Debug, Clone)]
pub struct RenameOptions {
    /// Report what would change without touching the filesystem.
    pub dry_run: bool,
    pub workers: usize,
    pub search: SearchConfig,
    /// Abort on the first per-file error instead of collecting it.
    pub stop_on_error: bool,
    pub excluded_folders: Vec<PathBuf>,
    pub ignore: Vec<String>,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            workers: 4,
            search: SearchConfig::default(),
            stop_on_error: false,
            excluded_folders: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

/// Outcome of a rename or batch rename.
#[derive(Debug, Clone, Serialize)]
pub struct RenameResult {
    /// Original path of the (first) moved file
    pub source_path: String,
    /// New path of the (first) moved file
    pub target_path: String,
    pub files_scanned: usize,
    pub files_modified: usize,
    pub links_updated: usize,
    /// Files whose links were (or would be) rewritten
    pub modified_files: Vec<String>,
    pub duration: Duration,
    pub errors: Vec<FileError>,
    pub warnings: Vec<String>,
    pub dry_run: bool,
    pub candidate_source: CandidateSource,
}

impl RenameResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
