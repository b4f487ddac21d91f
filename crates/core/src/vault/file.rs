//! A markdown file loaded from the vault.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::frontmatter::{self, Frontmatter};
use crate::links::{Link, extract_links};

#[derive(Debug, Error)]
pub enum VaultFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file is not inside the vault: {0}")]
    OutsideVault(String),
}

/// One markdown document: frontmatter block kept byte-for-byte, body as text,
/// links extracted on first use.
#[derive(Debug)]
pub struct VaultFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Vault-relative path with `/` separators.
    pub relative_path: String,
    pub frontmatter: Option<Frontmatter>,
    pub modified: DateTime<Utc>,
    block: String,
    body: String,
    links: OnceLock<Vec<Link>>,
}

impl Clone for VaultFile {
    fn clone(&self) -> Self {
        let links = OnceLock::new();
        if let Some(cached) = self.links.get() {
            let _ = links.set(cached.clone());
        }
        Self {
            path: self.path.clone(),
            relative_path: self.relative_path.clone(),
            frontmatter: self.frontmatter.clone(),
            modified: self.modified,
            block: self.block.clone(),
            body: self.body.clone(),
            links,
        }
    }
}

impl VaultFile {
    /// Load a file from disk. `root` is the vault root used to compute the
    /// relative path.
    pub fn load(root: &Path, path: &Path) -> Result<Self, VaultFileError> {
        let content = fs::read_to_string(path)
            .map_err(|source| VaultFileError::Read { path: path.display().to_string(), source })?;

        let relative = path
            .strip_prefix(root)
            .map_err(|_| VaultFileError::OutsideVault(path.display().to_string()))?;
        let relative_path = relative.to_string_lossy().replace('\\', "/");

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut file = Self::from_content(relative_path, &content);
        file.path = path.to_path_buf();
        file.modified = modified;
        Ok(file)
    }

    /// Build a file from in-memory content. Invalid YAML is tolerated: the
    /// block is kept as-is and the frontmatter treated as absent.
    pub fn from_content(relative_path: impl Into<String>, content: &str) -> Self {
        let relative_path = relative_path.into();
        let doc = frontmatter::split(content);

        let frontmatter = if doc.block.is_empty() {
            None
        } else if doc.yaml.trim().is_empty() {
            Some(Frontmatter::default())
        } else {
            match serde_yaml::from_str::<Frontmatter>(doc.yaml) {
                Ok(fm) => Some(fm),
                Err(e) => {
                    warn!(file = %relative_path, error = %e, "ignoring invalid frontmatter");
                    None
                }
            }
        };

        Self {
            path: PathBuf::from(&relative_path),
            relative_path,
            frontmatter,
            modified: Utc::now(),
            block: doc.block.to_string(),
            body: doc.body.to_string(),
            links: OnceLock::new(),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Exact frontmatter text including both `---` delimiters, or empty.
    pub fn frontmatter_block(&self) -> &str {
        &self.block
    }

    /// Links in the body, extracted on first call after load or `set_body`.
    pub fn links(&self) -> &[Link] {
        self.links.get_or_init(|| extract_links(&self.body))
    }

    /// Replace the body. Cached link positions are dropped.
    pub fn set_body(&mut self, body: String) {
        self.body = body;
        self.links = OnceLock::new();
    }

    /// Full file content: original frontmatter block followed by the body.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.block.len() + self.body.len());
        out.push_str(&self.block);
        out.push_str(&self.body);
        out
    }

    /// File name without directories or extension.
    pub fn stem(&self) -> &str {
        use crate::links::resolver::{basename, strip_extension};
        strip_extension(basename(&self.relative_path))
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.frontmatter.as_ref().and_then(|fm| fm.get_str(key))
    }

    pub fn tags(&self) -> Vec<String> {
        self.frontmatter.as_ref().map(Frontmatter::tags).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_preserves_frontmatter_bytes() {
        let content = "---\ntitle:   Spaced   \ntags: [a,  b]\n---\nBody [[link]]\n";
        let file = VaultFile::from_content("note.md", content);
        assert_eq!(file.render(), content);
        assert_eq!(file.body(), "Body [[link]]\n");
        assert_eq!(file.field_str("title"), Some("Spaced"));
        assert_eq!(file.tags(), vec!["a", "b"]);
    }

    #[test]
    fn test_set_body_invalidates_links() {
        let mut file = VaultFile::from_content("note.md", "[[a]] [[b]]");
        assert_eq!(file.links().len(), 2);

        file.set_body("[[only]]".to_string());
        let links = file.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "only");
    }

    #[test]
    fn test_invalid_yaml_kept_verbatim() {
        let content = "---\nkey: [unclosed\n---\ntext\n";
        let file = VaultFile::from_content("bad.md", content);
        assert!(file.frontmatter.is_none());
        assert_eq!(file.render(), content);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        let path = nested.join("n.md");
        std::fs::write(&path, "---\nurl: https://x.com\n---\n[[other]]\n").unwrap();

        let file = VaultFile::load(dir.path(), &path).unwrap();
        assert_eq!(file.relative_path, "sub/n.md");
        assert_eq!(file.stem(), "n");
        assert_eq!(file.field_str("url"), Some("https://x.com"));
        assert_eq!(file.links()[0].target, "other");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = VaultFile::load(dir.path(), &dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, VaultFileError::Read { .. }));
    }
}
