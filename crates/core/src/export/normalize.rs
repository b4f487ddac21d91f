//! Filename normalization for exported notes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::links::resolver::{basename, extension, parent_dir, strip_extension};
use crate::links::{FileMove, LinkUpdater, PathResolver, PathStyle};
use crate::templates::slugify;
use crate::vault::VaultFile;

/// Stem used when slugifying leaves nothing.
pub const UNTITLED: &str = "untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    Slugify,
    Flatten,
    SlugifyFlatten,
}

impl NormalizeMode {
    pub fn from_flags(slugify: bool, flatten: bool) -> Option<Self> {
        match (slugify, flatten) {
            (true, true) => Some(Self::SlugifyFlatten),
            (true, false) => Some(Self::Slugify),
            (false, true) => Some(Self::Flatten),
            (false, false) => None,
        }
    }

    pub fn slugifies(self) -> bool {
        matches!(self, Self::Slugify | Self::SlugifyFlatten)
    }

    pub fn flattens(self) -> bool {
        matches!(self, Self::Flatten | Self::SlugifyFlatten)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slugify => "slugify",
            Self::Flatten => "flatten",
            Self::SlugifyFlatten => "slugify_flatten",
        }
    }
}

impl fmt::Display for NormalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "slugify" => Ok(Self::Slugify),
            "flatten" => Ok(Self::Flatten),
            "slugify_flatten" | "both" => Ok(Self::SlugifyFlatten),
            _ => Err(format!("unknown normalize mode: {}", s)),
        }
    }
}

/// Output names claimed so far in one run.
#[derive(Debug, Default)]
pub struct NormalizationState {
    claimed: HashSet<String>,
}

impl NormalizationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `path`, or the first free `name-N.ext` variant of it.
    /// Comparison ignores case.
    pub fn claim(&mut self, path: &str) -> String {
        if self.claimed.insert(path.to_lowercase()) {
            return path.to_string();
        }

        let stem = strip_extension(path);
        let ext = &path[stem.len()..];
        let mut n = 1;
        loop {
            let candidate = format!("{stem}-{n}{ext}");
            if self.claimed.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilenameNormalizationResult {
    /// Old path -> new path, only for files whose path changed.
    pub mapping: BTreeMap<String, String>,
}

impl FilenameNormalizationResult {
    pub fn files_renamed(&self) -> usize {
        self.mapping.len()
    }

    /// New path of `path`, which is itself when unchanged.
    pub fn destination<'a>(&'a self, path: &'a str) -> &'a str {
        self.mapping.get(path).map_or(path, String::as_str)
    }

    pub fn moves(&self) -> Vec<FileMove> {
        self.mapping.iter().map(|(from, to)| FileMove::new(from.as_str(), to.as_str())).collect()
    }
}

/// What [`FilenameNormalizer::update_file_links`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkUpdateReport {
    pub links_updated: usize,
    /// `(file, target)` for links left alone because several notes match.
    pub ambiguous: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy)]
pub struct FilenameNormalizer {
    mode: NormalizeMode,
}

impl FilenameNormalizer {
    pub fn new(mode: NormalizeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NormalizeMode {
        self.mode
    }

    /// Compute new paths. Collisions are resolved in input order, so the
    /// first file keeps the plain name.
    pub fn normalize<S: AsRef<str>>(&self, paths: &[S]) -> FilenameNormalizationResult {
        let mut state = NormalizationState::new();
        let mut result = FilenameNormalizationResult::default();

        for path in paths {
            let path = path.as_ref();
            let target = state.claim(&self.normalized_path(path));
            if target != path {
                debug!(from = path, to = %target, "normalized file name");
                result.mapping.insert(path.to_string(), target);
            }
        }
        result
    }

    /// Rewrite links in `files` for the new names and move each file to its
    /// new relative path.
    ///
    /// `resolver` must describe the vault before normalization.
    pub fn update_file_links(
        &self,
        files: &mut [VaultFile],
        result: &FilenameNormalizationResult,
        resolver: Arc<PathResolver>,
    ) -> LinkUpdateReport {
        let style = if self.mode.flattens() { PathStyle::Basename } else { PathStyle::Relative };
        let updater = LinkUpdater::new(&result.moves()).with_resolver(resolver).with_style(style);

        let mut report = LinkUpdateReport::default();
        for file in files.iter_mut() {
            let old = file.relative_path.clone();
            let new = result.destination(&old).to_string();
            let outcome = updater.update_relocated(file.body(), file.links(), &old, &new);
            let ambiguous = outcome.ambiguous.iter().map(|target| (old.clone(), target.clone()));
            report.ambiguous.extend(ambiguous);
            if outcome.changed() {
                report.links_updated += outcome.links_updated;
                file.set_body(outcome.body);
            }
            file.relative_path = new;
        }
        report
    }

    fn normalized_path(&self, path: &str) -> String {
        let dir = if self.mode.flattens() { "" } else { parent_dir(path) };
        let name = basename(path);

        let name = if self.mode.slugifies() {
            let stem = strip_extension(name);
            let ext = &name[stem.len()..];
            let slug = slugify(stem);
            let slug = if slug.is_empty() { UNTITLED } else { slug.as_str() };
            match extension(name) {
                Some(_) => format!("{slug}{ext}"),
                None => slug.to_string(),
            }
        } else {
            name.to_string()
        };

        if dir.is_empty() { name } else { format!("{dir}/{name}") }
    }
}
