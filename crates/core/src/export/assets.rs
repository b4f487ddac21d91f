//! Attachments referenced by exported notes.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::analyzer::{LinkAnalyzer, LinkCategory};
use crate::vault::VaultFile;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetDiscoveryResult {
    /// Vault paths of referenced attachments that exist.
    pub assets: BTreeSet<String>,
    /// `(note, target)` pairs for attachments that could not be found.
    pub missing: Vec<(String, String)>,
}

impl AssetDiscoveryResult {
    pub fn warnings(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|(note, target)| format!("{note}: missing asset '{target}'"))
            .collect()
    }
}

/// Collect the attachments linked from `files`.
pub fn discover_assets(files: &[VaultFile], analyzer: &LinkAnalyzer) -> AssetDiscoveryResult {
    let mut result = AssetDiscoveryResult::default();
    for file in files {
        for link in file.links() {
            let analyzed = analyzer.classify(link, &file.relative_path);
            if analyzed.category != LinkCategory::Asset {
                continue;
            }
            match analyzed.resolved {
                Some(path) => {
                    result.assets.insert(path);
                }
                None => {
                    debug!(file = %file.relative_path, link = %link.target, "asset not found");
                    result.missing.push((file.relative_path.clone(), link.target.clone()));
                }
            }
        }
    }
    result
}
