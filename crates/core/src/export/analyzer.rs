//! Link classification for export.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::links::encoding::decode;
use crate::links::resolver::{extension, is_markdown_path};
use crate::links::{Link, PathResolver, ResolveError};
use crate::vault::VaultFile;

/// Extensions treated as attachments even when the file is missing.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "ico", "pdf", "mp3", "wav", "ogg", "m4a",
    "mp4", "webm", "mov", "csv", "xlsx", "docx", "pptx", "zip", "canvas", "excalidraw",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCategory {
    /// Points at a note inside the export.
    Internal,
    /// Points at a note outside the export, or nowhere.
    External,
    /// Points at an attachment.
    Asset,
    /// Absolute URL.
    Url,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkCategory::Internal => "internal",
            LinkCategory::External => "external",
            LinkCategory::Asset => "asset",
            LinkCategory::Url => "url",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedLink {
    pub link: Link,
    pub category: LinkCategory,
    /// Vault path the link resolved to, if any.
    pub resolved: Option<String>,
    /// Set when resolution stopped at several candidates.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkAnalysis {
    pub links: Vec<AnalyzedLink>,
    pub internal: usize,
    pub external: usize,
    pub asset: usize,
    pub url: usize,
    pub ambiguous: usize,
}

impl LinkAnalysis {
    pub fn of_category(&self, category: LinkCategory) -> impl Iterator<Item = &AnalyzedLink> {
        self.links.iter().filter(move |l| l.category == category)
    }

    fn push(&mut self, analyzed: AnalyzedLink) {
        match analyzed.category {
            LinkCategory::Internal => self.internal += 1,
            LinkCategory::External => self.external += 1,
            LinkCategory::Asset => self.asset += 1,
            LinkCategory::Url => self.url += 1,
        }
        if analyzed.ambiguous {
            self.ambiguous += 1;
        }
        self.links.push(analyzed);
    }
}

/// Classifies links against the whole vault and the export selection.
#[derive(Debug, Clone)]
pub struct LinkAnalyzer {
    resolver: Arc<PathResolver>,
    selection: BTreeSet<String>,
    asset_extensions: HashSet<String>,
}

impl LinkAnalyzer {
    pub fn new(resolver: Arc<PathResolver>, selection: BTreeSet<String>) -> Self {
        Self {
            resolver,
            selection,
            asset_extensions: DEFAULT_ASSET_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_asset_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.asset_extensions =
            extensions.iter().map(|e| e.as_ref().trim_start_matches('.').to_lowercase()).collect();
        self
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn analyze_file(&self, file: &VaultFile) -> LinkAnalysis {
        let mut analysis = LinkAnalysis::default();
        for link in file.links() {
            analysis.push(self.classify(link, &file.relative_path));
        }
        debug!(
            file = %file.relative_path,
            internal = analysis.internal,
            external = analysis.external,
            asset = analysis.asset,
            url = analysis.url,
            "analyzed links"
        );
        analysis
    }

    /// Category of one link written in `source`.
    ///
    /// URLs are recognized before anything else so remote images never count
    /// as assets.
    pub fn classify(&self, link: &Link, source: &str) -> AnalyzedLink {
        let analyzed = |category, resolved, ambiguous| AnalyzedLink {
            link: link.clone(),
            category,
            resolved,
            ambiguous,
        };

        if link.is_url() {
            return analyzed(LinkCategory::Url, None, false);
        }

        let resolved = match self.resolver.resolve(&link.target, source, link.link_type) {
            Err(ResolveError::Unresolvable(_)) if has_asset_extension(link) => {
                self.resolver.find_asset(&link.target)
            }
            other => other,
        };

        match resolved {
            Ok(path) if self.selection.contains(&path) => {
                analyzed(LinkCategory::Internal, Some(path), false)
            }
            Ok(path) if is_markdown_path(&path) => {
                analyzed(LinkCategory::External, Some(path), false)
            }
            Ok(path) => analyzed(LinkCategory::Asset, Some(path), false),
            Err(ResolveError::Ambiguous { .. }) => analyzed(LinkCategory::External, None, true),
            Err(ResolveError::Unresolvable(_)) if self.looks_like_asset(link) => {
                analyzed(LinkCategory::Asset, None, false)
            }
            Err(ResolveError::Unresolvable(_)) => analyzed(LinkCategory::External, None, false),
        }
    }

    fn looks_like_asset(&self, link: &Link) -> bool {
        extension(&decode(link.path_part())).is_some_and(|ext| self.asset_extensions.contains(&ext))
    }
}

/// Target carries an extension other than `.md`.
fn has_asset_extension(link: &Link) -> bool {
    let decoded = decode(link.path_part());
    extension(&decoded).is_some() && !is_markdown_path(&decoded)
}
