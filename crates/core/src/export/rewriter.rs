//! Rewriting of links that leave the export.
//!
//! Strategies are looked up by [`StrategyKind`] in a [`StrategyRegistry`], so
//! the rewriter never branches on the concrete strategy.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::analyzer::{LinkAnalysis, LinkCategory};
use crate::links::{Link, Splicer};
use crate::vault::VaultFile;

/// Frontmatter keys searched by [`UrlStrategy`], in order.
pub const URL_FIELDS: &[&str] = &["url", "link", "source", "website"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Remove,
    Url,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Remove, StrategyKind::Url];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Remove => "remove",
            StrategyKind::Url => "url",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remove" | "text" => Ok(Self::Remove),
            "url" => Ok(Self::Url),
            _ => Err(format!("unknown external link strategy: {}", s)),
        }
    }
}

/// What a strategy did with one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Replacement {
    /// Link turned into plain text.
    Removed(String),
    /// Link pointed somewhere else.
    Converted(String),
}

impl Replacement {
    pub fn text(&self) -> &str {
        match self {
            Replacement::Removed(s) | Replacement::Converted(s) => s,
        }
    }
}

/// Handling of one external link.
pub trait ExternalLinkStrategy: fmt::Debug + Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Replacement text for `link`, written in `file`.
    fn replace(&self, link: &Link, file: &VaultFile) -> Replacement;
}

/// Keeps only the display text.
#[derive(Debug, Default)]
pub struct RemoveStrategy;

impl ExternalLinkStrategy for RemoveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Remove
    }

    fn replace(&self, link: &Link, _file: &VaultFile) -> Replacement {
        Replacement::Removed(link.display_text().to_string())
    }
}

/// Points the link at a URL from the source file's frontmatter, falling back
/// to plain text when there is none.
#[derive(Debug, Default)]
pub struct UrlStrategy;

impl UrlStrategy {
    pub fn source_url(file: &VaultFile) -> Option<&str> {
        URL_FIELDS
            .iter()
            .filter_map(|key| file.field_str(key))
            .map(str::trim)
            .find(|v| v.to_ascii_lowercase().starts_with("http"))
    }
}

impl ExternalLinkStrategy for UrlStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Url
    }

    fn replace(&self, link: &Link, file: &VaultFile) -> Replacement {
        match Self::source_url(file) {
            Some(url) if url.contains([' ', '(', ')']) => {
                Replacement::Converted(format!("[{}](<{}>)", link.display_text(), url))
            }
            Some(url) => Replacement::Converted(format!("[{}]({})", link.display_text(), url)),
            None => RemoveStrategy.replace(link, file),
        }
    }
}

/// Strategy implementations keyed by kind.
#[derive(Debug)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, Box<dyn ExternalLinkStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        let strategies = StrategyKind::ALL
            .into_iter()
            .map(|kind| {
                let strategy: Box<dyn ExternalLinkStrategy> = match kind {
                    StrategyKind::Remove => Box::new(RemoveStrategy),
                    StrategyKind::Url => Box::new(UrlStrategy),
                };
                (kind, strategy)
            })
            .collect();
        Self { strategies }
    }

    pub fn get(&self, kind: StrategyKind) -> Option<&dyn ExternalLinkStrategy> {
        self.strategies.get(&kind).map(Box::as_ref)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One rewritten link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteChange {
    /// Link source text as it was in the body.
    pub original: String,
    pub replacement: Replacement,
    /// Byte offset of the link in the original body.
    pub start: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub body: String,
    pub removed: usize,
    pub converted: usize,
    pub changes: usize,
    /// Rewritten links in body order.
    pub change_log: Vec<RewriteChange>,
}

/// Applies one strategy to the external links of a file.
#[derive(Debug)]
pub struct LinkRewriter {
    registry: StrategyRegistry,
    kind: StrategyKind,
}

impl LinkRewriter {
    pub fn new(kind: StrategyKind) -> Self {
        Self { registry: StrategyRegistry::new(), kind }
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Rewrite the external links found by `analysis`, which must have been
    /// computed from the current body of `file`.
    pub fn rewrite_file_content(
        &self,
        file: &VaultFile,
        analysis: &LinkAnalysis,
    ) -> RewriteOutcome {
        let mut outcome = RewriteOutcome::default();
        let Some(strategy) = self.registry.get(self.kind) else {
            outcome.body = file.body().to_string();
            return outcome;
        };

        let body = file.body();
        let mut splicer = Splicer::new();
        for analyzed in analysis.of_category(LinkCategory::External) {
            let link = &analyzed.link;
            let Some(original) = body.get(link.span()) else { continue };
            let replacement = strategy.replace(link, file);
            if !splicer.replace(link.span(), replacement.text()) {
                continue;
            }
            match replacement {
                Replacement::Removed(_) => outcome.removed += 1,
                Replacement::Converted(_) => outcome.converted += 1,
            }
            outcome.changes += 1;
            outcome.change_log.push(RewriteChange {
                original: original.to_string(),
                replacement,
                start: link.start,
            });
        }
        outcome.change_log.sort_by_key(|c| c.start);

        if outcome.changes > 0 {
            debug!(
                file = %file.relative_path,
                strategy = %self.kind,
                removed = outcome.removed,
                converted = outcome.converted,
                "rewrote external links"
            );
        }
        outcome.body = splicer.apply(body);
        outcome
    }
}
