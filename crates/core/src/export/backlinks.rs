//! Transitive backlink discovery.
//!
//! Starting from the export selection, each round adds every file that links
//! into the previous round's finds. Files join the processed set as soon as
//! they are found, which is what stops cycles.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancel::{CancelToken, Cancelled};
use crate::links::PathResolver;
use crate::vault::VaultFile;

pub const DEFAULT_MAX_BACKLINK_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BacklinksDiscoveryResult {
    /// Files found, excluding the starting selection.
    pub backlinks: BTreeSet<String>,
    /// Rounds that found at least one file.
    pub depth_reached: usize,
    /// Stopped at the depth limit with files still to expand.
    pub depth_exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct BacklinksHandler {
    resolver: Arc<PathResolver>,
    max_depth: usize,
}

impl BacklinksHandler {
    pub fn new(resolver: Arc<PathResolver>) -> Self {
        Self { resolver, max_depth: DEFAULT_MAX_BACKLINK_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Files in `files` that link, directly or through other files, into
    /// `selection`. Ambiguous and unresolvable links never count.
    pub fn discover(
        &self,
        files: &[VaultFile],
        selection: &BTreeSet<String>,
        cancel: &CancelToken,
    ) -> Result<BacklinksDiscoveryResult, Cancelled> {
        let targets: Vec<HashSet<String>> = files.iter().map(|f| self.outgoing(f)).collect();

        let mut result = BacklinksDiscoveryResult::default();
        let mut processed: HashSet<&str> = selection.iter().map(String::as_str).collect();
        let mut frontier: HashSet<&str> = processed.clone();
        let mut depth = 0;

        while !frontier.is_empty() && depth < self.max_depth {
            cancel.check()?;

            let mut next = HashSet::new();
            for (file, links_to) in files.iter().zip(&targets) {
                let path = file.relative_path.as_str();
                if processed.contains(path) {
                    continue;
                }
                if links_to.iter().any(|t| frontier.contains(t.as_str())) {
                    processed.insert(path);
                    next.insert(path);
                }
            }

            depth += 1;
            if !next.is_empty() {
                result.depth_reached = depth;
                debug!(depth, found = next.len(), "backlink round");
            }
            result.backlinks.extend(next.iter().map(|p| p.to_string()));
            frontier = next;
        }

        if !frontier.is_empty() && depth >= self.max_depth {
            result.depth_exhausted = true;
            warn!(
                max_depth = self.max_depth,
                pending = frontier.len(),
                "backlink depth limit reached"
            );
        }

        info!(
            backlinks = result.backlinks.len(),
            depth = result.depth_reached,
            "backlink discovery finished"
        );
        Ok(result)
    }

    /// Resolved targets of a file's links.
    fn outgoing(&self, file: &VaultFile) -> HashSet<String> {
        file.links()
            .iter()
            .filter(|l| !l.is_url())
            .filter_map(|l| self.resolver.resolve(&l.target, &file.relative_path, l.link_type).ok())
            .filter(|t| *t != file.relative_path)
            .collect()
    }
}
