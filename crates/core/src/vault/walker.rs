//! Recursive vault directory walker.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum VaultWalkerError {
    #[error("vault root does not exist: {0}")]
    MissingRoot(String),

    #[error("failed to walk vault directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),

    #[error("failed to read file metadata {0}: {1}")]
    MetadataError(String, #[source] std::io::Error),

    #[error("invalid ignore pattern '{0}': {1}")]
    BadPattern(String, #[source] globset::Error),
}

/// Information about a discovered file.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Absolute path to the file.
    pub absolute_path: PathBuf,
    /// Path relative to vault root, `/`-separated.
    pub relative_path: String,
    /// File modification time.
    pub modified: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

impl WalkedFile {
    pub fn is_markdown(&self) -> bool {
        crate::links::resolver::is_markdown_path(&self.relative_path)
    }
}

/// Walker for discovering files in a vault.
#[derive(Debug)]
pub struct VaultWalker {
    root: PathBuf,
    /// Folders to exclude from walking (relative paths from vault root).
    excluded_folders: Vec<PathBuf>,
    ignore_globs: Vec<Glob>,
    ignore: GlobSet,
}

impl VaultWalker {
    /// Create a new walker for the given vault root.
    pub fn new(root: &Path) -> Result<Self, VaultWalkerError> {
        Self::with_exclusions(root, Vec::new())
    }

    /// Create a new walker with folder exclusions.
    ///
    /// Excluded folders can be specified as:
    /// - Relative paths from vault root (e.g., "automations/templates")
    /// - Absolute paths (will be converted to relative)
    pub fn with_exclusions(
        root: &Path,
        excluded_folders: Vec<PathBuf>,
    ) -> Result<Self, VaultWalkerError> {
        let root = root
            .canonicalize()
            .map_err(|_| VaultWalkerError::MissingRoot(root.display().to_string()))?;

        if !root.is_dir() {
            return Err(VaultWalkerError::MissingRoot(root.display().to_string()));
        }

        let excluded_folders = excluded_folders
            .into_iter()
            .map(|p| {
                if p.is_absolute() { p.strip_prefix(&root).unwrap_or(&p).to_path_buf() } else { p }
            })
            .collect();

        Ok(Self { root, excluded_folders, ignore_globs: Vec::new(), ignore: GlobSet::empty() })
    }

    /// Add ignore globs matched against vault-relative paths.
    ///
    /// `*` matches within one path segment, `**` across segments, `?` one character.
    pub fn with_ignore_patterns<S: AsRef<str>>(
        mut self,
        patterns: &[S],
    ) -> Result<Self, VaultWalkerError> {
        if patterns.is_empty() {
            return Ok(self);
        }
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = path_glob(pattern)
                .map_err(|e| VaultWalkerError::BadPattern(pattern.to_string(), e))?;
            self.ignore_globs.push(glob);
        }

        let mut builder = GlobSetBuilder::new();
        for glob in &self.ignore_globs {
            builder.add(glob.clone());
        }
        self.ignore = builder.build().map_err(|e| {
            let all = self.ignore_globs.iter().map(Glob::glob).collect::<Vec<_>>().join(", ");
            VaultWalkerError::BadPattern(all, e)
        })?;
        Ok(self)
    }

    /// Walk the vault and return all markdown files.
    pub fn walk(&self) -> Result<Vec<WalkedFile>, VaultWalkerError> {
        let mut files = Vec::new();
        self.walk_with_callback(|f| {
            if f.is_markdown() {
                files.push(f);
            }
        })?;
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    /// Walk the vault and return markdown files and assets.
    pub fn walk_all(&self) -> Result<Vec<WalkedFile>, VaultWalkerError> {
        let mut files = Vec::new();
        self.walk_with_callback(|f| files.push(f))?;
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    /// Walk the vault, handing every accepted file to `on_file` as it is found.
    /// Excludes hidden directories, common non-vault directories, configured
    /// exclusions and ignore globs.
    pub fn walk_with_callback<F>(&self, mut on_file: F) -> Result<(), VaultWalkerError>
    where
        F: FnMut(WalkedFile),
    {
        let entries = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));
        for entry in entries {
            let entry = entry
                .map_err(|e| VaultWalkerError::WalkError(self.root.display().to_string(), e))?;

            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = to_relative(path.strip_prefix(&self.root).unwrap_or(path));
            if self.is_ignored(&relative_path) {
                debug!(file = %relative_path, "ignored by pattern");
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                VaultWalkerError::MetadataError(path.display().to_string(), e.into())
            })?;

            on_file(WalkedFile {
                absolute_path: path.to_path_buf(),
                relative_path,
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
                size: metadata.len(),
            });
        }
        Ok(())
    }

    /// Whether a vault-relative path would be produced by a walk. Used to
    /// filter paths reported by outside tools.
    pub fn accepts(&self, relative_path: &str) -> bool {
        let mut prefix = PathBuf::new();
        for segment in relative_path.split('/').filter(|s| !s.is_empty()) {
            if is_skipped_name(segment) {
                return false;
            }
            prefix.push(segment);
            if self.excluded_folders.iter().any(|ex| prefix.starts_with(ex)) {
                return false;
            }
        }
        !self.is_ignored(relative_path)
    }

    /// Check if an entry should be excluded from walking.
    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // Never filter the root directory (depth 0)
        if entry.depth() == 0 {
            return false;
        }

        if is_skipped_name(&entry.file_name().to_string_lossy()) {
            return true;
        }

        if !self.excluded_folders.is_empty()
            && let Ok(relative) = entry.path().strip_prefix(&self.root)
        {
            return self.excluded_folders.iter().any(|excluded| relative.starts_with(excluded));
        }

        false
    }

    fn is_ignored(&self, relative_path: &str) -> bool {
        self.ignore.is_match(relative_path)
    }

    /// Get the vault root path.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hidden entries and common non-vault directories.
fn is_skipped_name(name: &str) -> bool {
    name.starts_with('.') || matches!(name, "node_modules" | "target" | "__pycache__" | "venv")
}

fn to_relative(path: &Path) -> String {
    path.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Compile a glob over vault-relative paths. `*` and `?` stay within one
/// segment; `**` spans segments.
pub(crate) fn path_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_vault() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("note1.md"), "# Note 1").unwrap();
        fs::write(root.join("note2.md"), "# Note 2").unwrap();

        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/note3.md"), "# Note 3").unwrap();

        fs::create_dir(root.join(".hidden")).unwrap();
        fs::write(root.join(".hidden/secret.md"), "# Secret").unwrap();

        fs::create_dir(root.join("attachments")).unwrap();
        fs::write(root.join("attachments/pic.png"), [0u8, 1, 2]).unwrap();

        dir
    }

    fn relative(files: &[WalkedFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_walk_finds_markdown_files_sorted() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        let files = walker.walk().unwrap();

        assert_eq!(relative(&files), vec!["note1.md", "note2.md", "subdir/note3.md"]);
    }

    #[test]
    fn test_walk_all_includes_assets() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        let files = walker.walk_all().unwrap();

        assert!(relative(&files).contains(&"attachments/pic.png"));
        assert!(!relative(&files).iter().any(|p| p.contains(".hidden")));
    }

    #[test]
    fn test_missing_root() {
        let result = VaultWalker::new(Path::new("/nonexistent/path"));
        assert!(matches!(result.unwrap_err(), VaultWalkerError::MissingRoot(_)));
    }

    #[test]
    fn test_walk_with_exclusions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(root.join("note1.md"), "# Note 1").unwrap();
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("templates/task.md"), "# Task Template").unwrap();
        fs::create_dir_all(root.join("docs/internal")).unwrap();
        fs::write(root.join("docs/readme.md"), "# Docs").unwrap();
        fs::write(root.join("docs/internal/secret.md"), "# Secret").unwrap();

        let excluded = vec![PathBuf::from("templates"), PathBuf::from("docs/internal")];
        let walker = VaultWalker::with_exclusions(root, excluded).unwrap();
        let files = walker.walk().unwrap();

        assert_eq!(relative(&files), vec!["docs/readme.md", "note1.md"]);
        assert!(!walker.accepts("templates/task.md"));
        assert!(!walker.accepts("docs/internal/secret.md"));
        assert!(walker.accepts("docs/readme.md"));
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/drafts/deep")).unwrap();
        fs::write(root.join("a/drafts/deep/x.md"), "").unwrap();
        fs::write(root.join("a/keep.md"), "").unwrap();
        fs::write(root.join("tmp1.md"), "").unwrap();

        let walker = VaultWalker::new(root)
            .unwrap()
            .with_ignore_patterns(&["**/drafts/**", "tmp?.md"])
            .unwrap();
        let files = walker.walk().unwrap();
        assert_eq!(relative(&files), vec!["a/keep.md"]);
    }

    #[test]
    fn test_callback_sees_every_file() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        let mut count = 0;
        walker.walk_with_callback(|_| count += 1).unwrap();
        assert_eq!(count, 4);
    }

    #[rstest]
    #[case("*.md", "note.md", true)]
    #[case("*.md", "dir/note.md", false)]
    #[case("**/*.md", "note.md", true)]
    #[case("**/*.md", "a/b/note.md", true)]
    #[case("drafts/**", "drafts/x/y.md", true)]
    #[case("note?.md", "note1.md", true)]
    #[case("note?.md", "note10.md", false)]
    #[case("a+b.md", "a+b.md", true)]
    #[case("{daily,weekly}/*.md", "weekly/w1.md", true)]
    #[case("note[0-9].md", "note7.md", true)]
    #[case("note[0-9].md", "notex.md", false)]
    fn test_path_glob(#[case] glob: &str, #[case] path: &str, #[case] expected: bool) {
        assert_eq!(path_glob(glob).unwrap().compile_matcher().is_match(path), expected);
    }

    #[test]
    fn test_bad_ignore_pattern() {
        let vault = create_test_vault();
        let result =
            VaultWalker::new(vault.path()).unwrap().with_ignore_patterns(&["drafts/[unclosed"]);
        assert!(matches!(
            result.unwrap_err(),
            VaultWalkerError::BadPattern(p, _) if p == "drafts/[unclosed"
        ));
    }

    #[test]
    fn test_ignore_patterns_accumulate() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path())
            .unwrap()
            .with_ignore_patterns(&["note1.md"])
            .unwrap()
            .with_ignore_patterns(&["subdir/**"])
            .unwrap();
        assert_eq!(relative(&walker.walk().unwrap()), vec!["note2.md"]);
    }

    #[test]
    fn test_accepts_rejects_hidden() {
        let vault = create_test_vault();
        let walker = VaultWalker::new(vault.path()).unwrap();
        assert!(!walker.accepts(".hidden/secret.md"));
        assert!(!walker.accepts("node_modules/x.md"));
        assert!(walker.accepts("subdir/note3.md"));
    }
}
