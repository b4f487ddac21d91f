//! Resolution of raw link targets to canonical vault-relative paths.
//!
//! A vault-relative path uses `/` separators and never starts with `..`.
//! Every path used as a map key anywhere in the engine goes through
//! [`clean_path`] first.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::trace;

use super::encoding::decode;
use super::types::LinkType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("ambiguous link target '{target}' matches: {}", .candidates.join(", "))]
    Ambiguous { target: String, candidates: Vec<String> },

    #[error("link target '{0}' does not resolve to a vault file")]
    Unresolvable(String),
}

/// How a fallback candidate matched. Higher ranks win outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    /// Only the file names agree.
    BaseName,
    /// Target (minus extension) equals the candidate's full path (minus extension).
    FullPath,
}

/// Index over the known vault file set (notes and assets).
#[derive(Debug, Default, Clone)]
pub struct PathResolver {
    paths: HashSet<String>,
    /// lowercase full path -> paths
    by_path: HashMap<String, Vec<String>>,
    /// lowercase full path without extension -> markdown paths
    by_note_path: HashMap<String, Vec<String>>,
    /// lowercase file name with extension -> paths
    by_name: HashMap<String, Vec<String>>,
    /// lowercase file name without extension -> markdown paths
    by_note_name: HashMap<String, Vec<String>>,
}

impl PathResolver {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolver = Self::default();
        for path in paths {
            if let Some(clean) = clean_path(path.as_ref()) {
                resolver.insert(clean);
            }
        }
        resolver
    }

    fn insert(&mut self, path: String) {
        if !self.paths.insert(path.clone()) {
            return;
        }
        let lower = path.to_lowercase();
        let name = basename(&lower).to_string();

        self.by_path.entry(lower.clone()).or_default().push(path.clone());
        self.by_name.entry(name.clone()).or_default().push(path.clone());

        if is_markdown_path(&path) {
            let note_path = strip_extension(&lower).to_string();
            let note_name = strip_extension(&name).to_string();
            self.by_note_path.entry(note_path).or_default().push(path.clone());
            self.by_note_name.entry(note_name).or_default().push(path);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Whether `path` is a known markdown note.
    pub fn is_markdown(&self, path: &str) -> bool {
        self.contains(path) && is_markdown_path(path)
    }

    /// Markdown link target from `from` to `to`, encoded the way editors write it.
    pub fn relative_link(&self, from: &str, to: &str) -> String {
        super::encoding::encode_link_path(&relative_path(from, to))
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.paths.iter()
    }

    /// Resolve `target`, written in the file at `source`, to a known vault path.
    ///
    /// 1. percent-decode, 2. strip `#fragment` (an empty remainder means the
    /// source itself), 3. leading `/` is vault-root relative, 4. otherwise join
    /// to the source directory, 5. fall back to a ranked search where a full
    /// path match beats a basename match. Only wiki-links may resolve by
    /// basename alone.
    pub fn resolve(
        &self,
        target: &str,
        source: &str,
        link_type: LinkType,
    ) -> Result<String, ResolveError> {
        let decoded = decode(target);
        let path_part = strip_fragment(&decoded).trim();

        if path_part.is_empty() {
            return Ok(source.to_string());
        }

        let (rooted, rest) = match path_part.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, path_part),
        };

        let joined =
            if rooted { clean_path(rest) } else { clean_path(&join(parent_dir(source), rest)) };
        if let Some(joined) = joined {
            if self.paths.contains(&joined) {
                return Ok(joined);
            }
            let with_md = format!("{joined}.md");
            if !is_markdown_path(&joined) && self.paths.contains(&with_md) {
                return Ok(with_md);
            }
        }

        let Some(key) = clean_path(rest) else {
            return Err(ResolveError::Unresolvable(target.to_string()));
        };

        let full = self.full_path_candidates(&key);
        if let Some(found) = pick(target, full, MatchRank::FullPath)? {
            return Ok(found);
        }

        if link_type == LinkType::Wiki {
            let by_name = self.basename_candidates(basename(&key));
            if let Some(found) = pick(target, by_name, MatchRank::BaseName)? {
                return Ok(found);
            }
        }

        Err(ResolveError::Unresolvable(target.to_string()))
    }

    /// Resolve an asset by file name anywhere in the vault.
    ///
    /// Embeds and markdown links never resolve by basename, but attachments
    /// are commonly written as `![[image.png]]` from any folder.
    pub fn find_asset(&self, target: &str) -> Result<String, ResolveError> {
        let decoded = decode(target);
        let name = basename(strip_fragment(&decoded).trim()).to_lowercase();
        let candidates: Vec<&String> = self
            .by_name
            .get(&name)
            .map(|v| v.iter().filter(|p| !is_markdown_path(p)).collect())
            .unwrap_or_default();

        pick(target, candidates, MatchRank::BaseName)?
            .ok_or_else(|| ResolveError::Unresolvable(target.to_string()))
    }

    /// Notes whose file name without extension equals `stem` (case-insensitive).
    pub fn notes_named(&self, stem: &str) -> &[String] {
        self.by_note_name.get(&stem.to_lowercase()).map_or(&[], Vec::as_slice)
    }

    fn full_path_candidates(&self, key: &str) -> Vec<&String> {
        let lower = key.to_lowercase();
        if let Some(hits) = self.by_path.get(&lower) {
            return hits.iter().collect();
        }
        // Without a matching extension only notes qualify: [[a/b]] never means a/b.png
        self.by_note_path.get(&lower).map(|v| v.iter().collect()).unwrap_or_default()
    }

    fn basename_candidates(&self, name: &str) -> Vec<&String> {
        let lower = name.to_lowercase();
        if let Some(hits) = self.by_name.get(&lower) {
            return hits.iter().collect();
        }
        self.by_note_name.get(&lower).map(|v| v.iter().collect()).unwrap_or_default()
    }
}

fn pick(
    target: &str,
    mut candidates: Vec<&String>,
    rank: MatchRank,
) -> Result<Option<String>, ResolveError> {
    match candidates.len() {
        0 => Ok(None),
        1 => {
            trace!(link = target, resolved = %candidates[0], ?rank, "resolved link");
            Ok(Some(candidates[0].clone()))
        }
        _ => {
            candidates.sort();
            Err(ResolveError::Ambiguous {
                target: target.to_string(),
                candidates: candidates.into_iter().cloned().collect(),
            })
        }
    }
}

/// Normalize a path to canonical vault-relative form.
///
/// Folds `.` and `..`, drops empty segments and converts `\` to `/`.
/// Returns `None` for paths that escape the vault root or are empty.
pub fn clean_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// Join a relative target onto a directory (both vault-relative).
pub fn join(dir: &str, target: &str) -> String {
    if dir.is_empty() { target.to_string() } else { format!("{dir}/{target}") }
}

/// Directory part of a vault-relative path (`""` at the root).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |pos| &path[..pos])
}

/// File name part of a vault-relative path.
pub fn basename(path: &str) -> &str {
    path.rfind('/').map_or(path, |pos| &path[pos + 1..])
}

/// Remove the extension of the last segment, if any.
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |p| p + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Lowercase extension of the last segment, without the dot.
pub fn extension(path: &str) -> Option<String> {
    let name = basename(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => Some(name[dot + 1..].to_lowercase()),
        _ => None,
    }
}

pub fn is_markdown_path(path: &str) -> bool {
    extension(path).is_some_and(|e| e == "md")
}

fn strip_fragment(target: &str) -> &str {
    target.find('#').map_or(target, |pos| &target[..pos])
}

/// Relative path from the directory of `from_file` to `to` (both vault-relative).
pub fn relative_path(from_file: &str, to: &str) -> String {
    let from_dir: Vec<&str> = parent_dir(from_file).split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();
    let (to_dirs, to_name) = to_parts.split_at(to_parts.len().saturating_sub(1));

    let common = from_dir.iter().zip(to_dirs.iter()).take_while(|(a, b)| a == b).count();

    let mut out: Vec<&str> = Vec::new();
    out.extend(std::iter::repeat_n("..", from_dir.len() - common));
    out.extend(&to_dirs[common..]);
    out.extend(to_name);
    out.join("/")
}
