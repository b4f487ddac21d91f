//! Per-file matching step run on the worker pool.

use std::path::Path;

use tracing::debug;

use super::types::FileError;
use crate::links::LinkUpdater;
use crate::vault::VaultFile;

pub use crate::links::should_update;

/// What rewriting one candidate produced.
#[derive(Debug, Clone, Default)]
pub struct FileMatch {
    pub path: String,
    /// Full new file content, present only when the body changed.
    pub content: Option<String>,
    pub links_updated: usize,
    pub ambiguous: Vec<String>,
}

/// Load `relative` and rewrite its links for the updater's moves. A file that
/// is itself moved also gets its relative links rebased.
pub fn match_file(
    root: &Path,
    relative: &str,
    updater: &LinkUpdater,
) -> Result<FileMatch, FileError> {
    let file =
        VaultFile::load(root, &root.join(relative)).map_err(|e| FileError::new(relative, e))?;

    let outcome = match updater.destination_of(relative) {
        Some(new_location) => {
            updater.update_relocated(file.body(), file.links(), relative, new_location)
        }
        None => updater.update_links(file.body(), file.links(), relative),
    };

    let content = if outcome.body != file.body() {
        debug!(file = relative, links = outcome.links_updated, "links rewritten");
        Some(format!("{}{}", file.frontmatter_block(), outcome.body))
    } else {
        None
    };

    Ok(FileMatch {
        path: relative.to_string(),
        content,
        links_updated: outcome.links_updated,
        ambiguous: outcome.ambiguous,
    })
}
