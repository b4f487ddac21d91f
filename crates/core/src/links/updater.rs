//! Reference rewriting for moved files.
//!
//! Given a batch of [`FileMove`]s, rewrites every link in a body that points
//! at one of the old paths so it points at the new one. The link keeps its
//! syntax, alias, fragment and (where possible) the way its path was written:
//! basename wiki-links stay basenames, relative markdown links stay relative.
//!
//! Without a resolver, matching is purely textual against a dictionary of the
//! old paths. With a resolver of the pre-move vault, a link matches only if it
//! actually resolves to a moved file.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use super::encoding::{decode, encode_link_path, encoded_variants, needs_encoding};
use super::extractor::extract_links;
use super::resolver::{
    PathResolver, ResolveError, basename, clean_path, is_markdown_path, join, parent_dir,
    relative_path, strip_extension,
};
use super::splice::Splicer;
use super::types::{FileMove, Link, LinkType};

/// How a rewritten target path is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle {
    /// Keep the form the link was written in (basename, vault path, relative).
    #[default]
    Preserve,
    /// Always relative to the (new) location of the source file.
    Relative,
    /// File name only.
    Basename,
}

/// Result of rewriting one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub body: String,
    pub links_updated: usize,
    /// Targets skipped because they matched several files.
    pub ambiguous: Vec<String>,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        self.links_updated > 0
    }
}

enum Classified {
    Moved(usize),
    /// Resolves to an unmoved file; only relevant when the source itself moves.
    Unmoved(String),
    Ambiguous,
    Unmatched,
}

/// Rewrites references to a batch of moved files.
#[derive(Debug, Clone, Default)]
pub struct LinkUpdater {
    moves: Vec<FileMove>,
    /// cleaned `from` -> move index
    from_index: HashMap<String, usize>,
    /// lowercase spellings of `from` (with/without `.md`, encoded) -> move index
    keys: HashMap<String, usize>,
    /// lowercase note stem -> move index, only for stems unique in the batch
    stems: HashMap<String, usize>,
    resolver: Option<Arc<PathResolver>>,
    style: PathStyle,
}

impl LinkUpdater {
    pub fn new(moves: &[FileMove]) -> Self {
        let mut updater = Self::default();
        let mut stem_counts: HashMap<String, usize> = HashMap::new();

        for mv in moves {
            let (Some(from), Some(to)) = (clean_path(&mv.from), clean_path(&mv.to)) else {
                warn!(from = %mv.from, to = %mv.to, "ignoring move with an invalid path");
                continue;
            };
            if from == to || updater.from_index.contains_key(&from) {
                continue;
            }
            let idx = updater.moves.len();

            let mut spellings = vec![from.clone()];
            if is_markdown_path(&from) {
                spellings.push(strip_extension(&from).to_string());
                *stem_counts.entry(stem_of(&from)).or_default() += 1;
            }
            let encoded: Vec<String> = spellings.iter().flat_map(|s| encoded_variants(s)).collect();
            for key in spellings.into_iter().chain(encoded) {
                updater.keys.entry(key.to_lowercase()).or_insert(idx);
            }

            updater.from_index.insert(from.clone(), idx);
            updater.moves.push(FileMove { from, to });
        }

        for (idx, mv) in updater.moves.iter().enumerate() {
            if !is_markdown_path(&mv.from) {
                continue;
            }
            let stem = stem_of(&mv.from);
            if stem_counts.get(&stem) == Some(&1) {
                updater.stems.insert(stem, idx);
            }
        }

        updater
    }

    /// Match links by resolving them against the pre-move vault.
    pub fn with_resolver(mut self, resolver: Arc<PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_style(mut self, style: PathStyle) -> Self {
        self.style = style;
        self
    }

    pub fn moves(&self) -> &[FileMove] {
        &self.moves
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// New location of a vault path, if it is part of this batch.
    pub fn destination_of(&self, path: &str) -> Option<&str> {
        self.from_index.get(path).map(|&i| self.moves[i].to.as_str())
    }

    /// Rewrite references in `body`, matching paths as vault-root relative.
    pub fn update_references(&self, body: &str) -> String {
        let links = extract_links(body);
        self.rewrite(body, &links, None, None).body
    }

    /// Rewrite references in `body` of the file at `source` (which stays put).
    pub fn update_references_from(&self, body: &str, source: &str) -> UpdateOutcome {
        let links = extract_links(body);
        self.rewrite(body, &links, Some(source), Some(source))
    }

    /// Like [`Self::update_references_from`] with links already extracted from `body`.
    pub fn update_links(&self, body: &str, links: &[Link], source: &str) -> UpdateOutcome {
        self.rewrite(body, links, Some(source), Some(source))
    }

    /// Rewrite a file that is itself being moved from `old` to `new`.
    ///
    /// Links to moved files are retargeted, and path-relative links to files
    /// that stay put are rebased onto the new location.
    pub fn update_relocated(
        &self,
        body: &str,
        links: &[Link],
        old: &str,
        new: &str,
    ) -> UpdateOutcome {
        self.rewrite(body, links, Some(old), Some(new))
    }

    /// The move this link points at, if any.
    pub fn matching_move(&self, link: &Link, source: Option<&str>) -> Option<&FileMove> {
        match self.classify(link, source) {
            Classified::Moved(idx) => Some(&self.moves[idx]),
            _ => None,
        }
    }

    fn rewrite(
        &self,
        body: &str,
        links: &[Link],
        old_source: Option<&str>,
        new_source: Option<&str>,
    ) -> UpdateOutcome {
        let relocated = matches!((old_source, new_source), (Some(o), Some(n)) if o != n);
        let mut outcome = UpdateOutcome::default();
        if self.is_empty() && !relocated {
            outcome.body = body.to_string();
            return outcome;
        }

        let mut splicer = Splicer::new();
        for link in links {
            if link.is_url() || link.path_part().trim().is_empty() {
                continue;
            }
            let new_path = match self.classify(link, old_source) {
                Classified::Moved(idx) => {
                    let FileMove { from, to } = &self.moves[idx];
                    self.retarget(link, from, to, old_source, new_source)
                }
                Classified::Unmoved(target)
                    if relocated && self.is_path_relative(link, &target, old_source) =>
                {
                    self.retarget(link, &target, &target, old_source, new_source)
                }
                Classified::Ambiguous => {
                    outcome.ambiguous.push(link.target.clone());
                    continue;
                }
                Classified::Unmoved(_) | Classified::Unmatched => continue,
            };

            let Some(original) = body.get(link.span()) else { continue };
            let replacement = render_link(link, original, &new_path);
            if replacement != original && splicer.replace(link.span(), replacement) {
                outcome.links_updated += 1;
            }
        }

        if outcome.links_updated > 0 {
            debug!(
                links = outcome.links_updated,
                source = old_source.unwrap_or(""),
                "rewrote links"
            );
        }
        outcome.body = splicer.apply(body);
        outcome
    }

    fn classify(&self, link: &Link, source: Option<&str>) -> Classified {
        if let (Some(resolver), Some(source)) = (&self.resolver, source) {
            let resolved = match resolver.resolve(&link.target, source, link.link_type) {
                Err(ResolveError::Unresolvable(_))
                    if !is_markdown_path(&decode(link.path_part())) =>
                {
                    resolver.find_asset(&link.target)
                }
                other => other,
            };
            return match resolved {
                Ok(path) => match self.from_index.get(&path) {
                    Some(&idx) => Classified::Moved(idx),
                    None => Classified::Unmoved(path),
                },
                Err(ResolveError::Ambiguous { target, candidates }) => {
                    if candidates.iter().any(|c| self.from_index.contains_key(c)) {
                        warn!(
                            link = %target,
                            candidates = candidates.len(),
                            "skipping ambiguous link"
                        );
                        Classified::Ambiguous
                    } else {
                        Classified::Unmatched
                    }
                }
                Err(ResolveError::Unresolvable(_)) => Classified::Unmatched,
            };
        }

        self.dictionary_match(link, source).map_or(Classified::Unmatched, Classified::Moved)
    }

    /// Textual match: full path with or without extension, URL-decoded, then
    /// the source-relative join, then a unique basename for wiki-style links.
    fn dictionary_match(&self, link: &Link, source: Option<&str>) -> Option<usize> {
        let raw = link.path_part().trim();
        let decoded = decode(raw);

        for candidate in [raw, decoded.as_ref()] {
            if let Some(key) = clean_path(candidate.trim_start_matches('/'))
                && let Some(&idx) = self.keys.get(&key.to_lowercase())
            {
                return Some(idx);
            }
        }

        if let Some(source) = source
            && !decoded.starts_with('/')
            && let Some(joined) = clean_path(&join(parent_dir(source), &decoded))
        {
            if let Some(&idx) = self.from_index.get(&joined) {
                return Some(idx);
            }
            if let Some(&idx) = self.from_index.get(&format!("{joined}.md")) {
                return Some(idx);
            }
        }

        if link.link_type.is_wiki_style() && !decoded.contains('/') {
            return self.stems.get(&stem_of(&decoded)).copied();
        }
        None
    }

    /// Whether the link was written relative to the source file's directory.
    fn is_path_relative(&self, link: &Link, target: &str, source: Option<&str>) -> bool {
        let decoded = decode(link.path_part().trim());
        if decoded.starts_with('/') {
            return false;
        }
        if link.link_type.is_wiki_style() {
            return decoded.starts_with("./") || decoded.starts_with("../");
        }
        let Some(source) = source else { return false };
        match clean_path(&join(parent_dir(source), &decoded)) {
            Some(joined) => joined == target || format!("{joined}.md") == target,
            None => false,
        }
    }

    /// New path part for a link currently pointing at `from`, now at `to`.
    fn retarget(
        &self,
        link: &Link,
        from: &str,
        to: &str,
        old_source: Option<&str>,
        new_source: Option<&str>,
    ) -> String {
        let raw = link.path_part().trim();
        let decoded = decode(raw);
        let rooted = decoded.starts_with('/');
        let dot_prefixed = decoded.starts_with("./");

        let mut path = match self.style {
            // Files that stay put keep a real path so they still resolve
            PathStyle::Basename if from != to => basename(to).to_string(),
            PathStyle::Basename | PathStyle::Relative => match new_source {
                Some(src) => relative_path(src, to),
                None => to.to_string(),
            },
            PathStyle::Preserve if rooted => format!("/{to}"),
            PathStyle::Preserve if link.link_type.is_wiki_style() && !decoded.contains('/') => {
                if self.basename_stays_unique(from, to) {
                    basename(to).to_string()
                } else {
                    to.to_string()
                }
            }
            PathStyle::Preserve => match new_source {
                Some(src) if self.is_path_relative(link, from, old_source) => {
                    let rel = relative_path(src, to);
                    if dot_prefixed && !rel.starts_with("../") { format!("./{rel}") } else { rel }
                }
                _ => to.to_string(),
            },
        };

        // Keep the extension off when the link was written without it
        if is_markdown_path(&path) && !is_markdown_path(&decoded) {
            path = strip_extension(&path).to_string();
        }

        if link.link_type == LinkType::Markdown && needs_encoding(&path) {
            path = encode_link_path(&path);
        }
        path
    }

    /// Whether the new file name still identifies a single note after the batch.
    fn basename_stays_unique(&self, from: &str, to: &str) -> bool {
        if !is_markdown_path(to) {
            return true;
        }
        let stem = stem_of(to);
        let clashing_moves =
            self.moves.iter().filter(|m| m.from != from && stem_of(&m.to) == stem).count();
        let clashing_files = match &self.resolver {
            Some(resolver) => resolver
                .notes_named(&stem)
                .iter()
                .filter(|p| !self.from_index.contains_key(*p))
                .count(),
            None => 0,
        };
        clashing_moves + clashing_files == 0
    }
}

/// Rewrite references to `moves` in `body`, treating link paths as vault-root relative.
pub fn update_references(body: &str, moves: &[FileMove]) -> String {
    LinkUpdater::new(moves).update_references(body)
}

/// Whether `link`, written in `source`, refers to the old location of `mv`.
pub fn should_update(link: &Link, mv: &FileMove, source: Option<&str>) -> bool {
    LinkUpdater::new(std::slice::from_ref(mv)).matching_move(link, source).is_some()
}

/// Render `link` with a new path, keeping syntax, alias and fragment.
pub fn render_link(link: &Link, original: &str, new_path: &str) -> String {
    let target = match &link.fragment {
        Some(fragment) => format!("{new_path}#{fragment}"),
        None => new_path.to_string(),
    };
    match link.link_type {
        LinkType::Wiki | LinkType::Embed => {
            let bang = if link.link_type == LinkType::Embed { "!" } else { "" };
            if link.has_alias() {
                let pipe = if original.contains("\\|") { "\\|" } else { "|" };
                format!("{bang}[[{target}{pipe}{}]]", link.text)
            } else {
                format!("{bang}[[{target}]]")
            }
        }
        LinkType::Markdown => {
            let bang = if link.image { "!" } else { "" };
            format!("{bang}[{}]({target})", link.text)
        }
    }
}

fn stem_of(path: &str) -> String {
    strip_extension(basename(path)).to_lowercase()
}

/// Paths of a batch that collide on their destination.
pub fn duplicate_destinations(moves: &[FileMove]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for mv in moves {
        if !seen.insert(mv.to.to_lowercase()) && !dupes.contains(&mv.to) {
            dupes.push(mv.to.clone());
        }
    }
    dupes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mv(from: &str, to: &str) -> FileMove {
        FileMove::new(from, to)
    }

    #[test]
    fn test_wikilink_full_path() {
        let out = update_references("See [[old/note]]", &[mv("old/note.md", "new/note.md")]);
        assert_eq!(out, "See [[new/note]]");
    }

    #[test]
    fn test_markdown_link_reencoded() {
        let out = update_references(
            "[text](file%20with%20spaces.md)",
            &[mv("file with spaces.md", "renamed file.md")],
        );
        assert_eq!(out, "[text](renamed%20file.md)");
    }

    #[test]
    fn test_preserves_alias_fragment_and_embed() {
        let moves = [mv("notes/a.md", "archive/b.md")];
        let body = "[[notes/a|Alias]] [[notes/a#Intro]] ![[notes/a]] [t](notes/a.md#x)";
        assert_eq!(
            update_references(body, &moves),
            "[[archive/b|Alias]] [[archive/b#Intro]] ![[archive/b]] [t](archive/b.md#x)"
        );
    }

    #[test]
    fn test_basename_wikilink_stays_basename() {
        let out =
            update_references("[[note]] and [[Note|n]]", &[mv("old/note.md", "new/renamed.md")]);
        assert_eq!(out, "[[renamed]] and [[renamed|n]]");
    }

    #[test]
    fn test_escaped_pipe_kept_in_tables() {
        let out = update_references("| [[a\\|A]] |", &[mv("a.md", "b.md")]);
        assert_eq!(out, "| [[b\\|A]] |");
    }

    #[test]
    fn test_empty_moves_is_identity() {
        let body = "[[a]] [b](c.md) ![[img.png]]";
        assert_eq!(update_references(body, &[]), body);
    }

    #[test]
    fn test_idempotent() {
        let moves = [mv("a.md", "dir/b.md"), mv("x y.md", "z.md")];
        let body = "[[a]] [l](x%20y.md) [[a#h|alias]]";
        let once = update_references(body, &moves);
        assert_eq!(update_references(&once, &moves), once);
    }

    #[test]
    fn test_earlier_links_survive_length_changes() {
        let moves = [mv("a.md", "a-much-longer-name.md"), mv("bbbbbbbb.md", "b.md")];
        let body = "[[a]] then [[bbbbbbbb]] then [[a]] and [[untouched]]";
        assert_eq!(
            update_references(body, &moves),
            "[[a-much-longer-name]] then [[b]] then [[a-much-longer-name]] and [[untouched]]"
        );
    }

    #[test]
    fn test_urls_and_code_untouched() {
        let body = "[x](https://a.md) `[[a]]` [[a]]";
        assert_eq!(
            update_references(body, &[mv("a.md", "b.md")]),
            "[x](https://a.md) `[[a]]` [[b]]"
        );
    }

    #[test]
    fn test_relative_markdown_link_from_source() {
        let updater = LinkUpdater::new(&[mv("notes/target.md", "archive/target.md")]);
        let out = updater.update_references_from("[t](./target.md)", "notes/source.md");
        assert_eq!(out.body, "[t](../archive/target.md)");
        assert_eq!(out.links_updated, 1);
    }

    #[test]
    fn test_resolver_mode_only_updates_real_target() {
        let resolver =
            Arc::new(PathResolver::new(["a/note.md", "b/note.md", "a/src.md", "c/src.md"]));
        let updater = LinkUpdater::new(&[mv("a/note.md", "a/renamed.md")]).with_resolver(resolver);

        // Joined path resolves to a/note.md
        let out = updater.update_references_from("[[note]]", "a/src.md");
        assert_eq!(out.body, "[[renamed]]");

        // Ambiguous basename from elsewhere: skipped
        let out = updater.update_references_from("[[note]]", "c/src.md");
        assert_eq!(out.body, "[[note]]");
        assert_eq!(out.ambiguous, vec!["note".to_string()]);

        // Points at the other note
        let out = updater.update_references_from("[[b/note]]", "c/src.md");
        assert_eq!(out.links_updated, 0);
    }

    #[test]
    fn test_basename_that_would_clash_uses_full_path() {
        let resolver = Arc::new(PathResolver::new(["a/x.md", "b/y.md", "src.md"]));
        let updater = LinkUpdater::new(&[mv("a/x.md", "a/y.md")]).with_resolver(resolver);
        let out = updater.update_references_from("[[x]]", "src.md");
        assert_eq!(out.body, "[[a/y]]");
    }

    #[test]
    fn test_relocated_file_rebases_relative_links() {
        let resolver = Arc::new(PathResolver::new(["notes/a.md", "notes/b.md", "index.md"]));
        let updater =
            LinkUpdater::new(&[mv("notes/a.md", "archive/deep/a.md")]).with_resolver(resolver);
        let body = "[b](b.md) [[b]] [i](/index.md)";
        let links = extract_links(body);
        let out = updater.update_relocated(body, &links, "notes/a.md", "archive/deep/a.md");
        assert_eq!(out.body, "[b](../../notes/b.md) [[b]] [i](/index.md)");
    }

    #[test]
    fn test_asset_embed_by_basename() {
        let resolver = Arc::new(PathResolver::new(["img/pic.png", "notes/n.md"]));
        let updater =
            LinkUpdater::new(&[mv("img/pic.png", "img/photo.png")]).with_resolver(resolver);
        let out = updater.update_references_from("![[pic.png|200]]", "notes/n.md");
        assert_eq!(out.body, "![[photo.png|200]]");
    }

    #[test]
    fn test_style_relative_and_basename() {
        let moves = [mv("A Note.md", "a-note.md")];
        let relative = LinkUpdater::new(&moves).with_style(PathStyle::Relative);
        let out = relative.update_references_from("[x](A%20Note.md)", "s.md");
        assert_eq!(out.body, "[x](a-note.md)");

        let out = relative.update_references_from("[x](../A%20Note.md)", "dir/s.md");
        assert_eq!(out.body, "[x](../a-note.md)");

        let flat = LinkUpdater::new(&[mv("deep/dir/A.md", "A.md")]).with_style(PathStyle::Basename);
        assert_eq!(flat.update_references("[[deep/dir/A]]"), "[[A]]");
    }

    #[rstest]
    #[case::wiki_basename("[[note]]", "src.md", "old/note.md", "new/renamed.md")]
    #[case::wiki_path_alias(
        "[[old/My Note|alias]]",
        "src.md",
        "old/My Note.md",
        "new/Other Note.md"
    )]
    #[case::markdown_relative(
        "[t](../old/My%20Note.md#h)",
        "notes/s.md",
        "old/My Note.md",
        "archive/deep/Renamed Note.md"
    )]
    #[case::markdown_up_a_level("see [x](b.md)", "dir/s.md", "dir/b.md", "c.md")]
    #[case::embed_note("![[old/note]]", "src.md", "old/note.md", "new/note2.md")]
    fn test_rewritten_link_resolves_to_destination(
        #[case] body: &str,
        #[case] source: &str,
        #[case] from: &str,
        #[case] to: &str,
    ) {
        let before = [source, from, "other/unrelated.md"];
        let after = [source, to, "other/unrelated.md"];
        let resolver = Arc::new(PathResolver::new(before));
        let updater = LinkUpdater::new(&[mv(from, to)]).with_resolver(resolver);

        let out = updater.update_references_from(body, source);
        assert_eq!(out.links_updated, 1, "{}", out.body);

        let links = extract_links(&out.body);
        assert_eq!(links.len(), 1);
        let moved = PathResolver::new(after);
        let resolved = moved.resolve(&links[0].target, source, links[0].link_type);
        assert_eq!(resolved, Ok(to.to_string()));
    }

    #[test]
    fn test_should_update() {
        let m = mv("notes/My File.md", "notes/other.md");
        let links = extract_links("[[notes/My File]] [x](notes/My%20File.md) [[my file]] [[nope]]");
        let got: Vec<bool> = links.iter().map(|l| should_update(l, &m, None)).collect();
        assert_eq!(got, vec![true, true, true, false]);
    }

    #[test]
    fn test_duplicate_destinations() {
        let moves = [mv("a.md", "x.md"), mv("b.md", "X.md"), mv("c.md", "y.md")];
        let dupes = duplicate_destinations(&moves);
        assert_eq!(dupes, vec!["X.md".to_string()]);
    }
}
