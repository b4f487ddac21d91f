//! Link model shared by the extractor, resolver and rewriters.

use serde::Serialize;

/// Syntax a link was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// `[[target]]` or `[[target|alias]]`
    Wiki,
    /// `[text](target)` or `![alt](target)`
    Markdown,
    /// `![[target]]`
    Embed,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wiki => "wiki",
            Self::Markdown => "markdown",
            Self::Embed => "embed",
        }
    }

    /// Wiki-style syntax (`[[...]]`), where the `.md` extension is usually omitted.
    pub fn is_wiki_style(&self) -> bool {
        matches!(self, Self::Wiki | Self::Embed)
    }
}

/// A link found in a document body.
///
/// `start..end` is a byte span into the body at extraction time. Any edit
/// before `start` invalidates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub link_type: LinkType,
    /// Target exactly as written, possibly URL-encoded, possibly with `#fragment`.
    pub target: String,
    /// Alias for wiki-links and embeds, link text for markdown links.
    /// Equal to `target` for wiki-links without an alias.
    pub text: String,
    /// Section or block anchor after `#`, if any.
    pub fragment: Option<String>,
    pub start: usize,
    pub end: usize,
    /// Markdown image syntax `![alt](path)`.
    pub image: bool,
}

impl Link {
    /// Target without its `#fragment`, as written.
    pub fn path_part(&self) -> &str {
        match self.target.find('#') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Whether the display text differs from the target (an alias is present).
    pub fn has_alias(&self) -> bool {
        self.text != self.target
    }

    /// Text to show when the link is turned into plain prose.
    pub fn display_text(&self) -> &str {
        if self.text.trim().is_empty() { &self.target } else { &self.text }
    }

    /// Target has an absolute URL scheme (http, https, mailto).
    pub fn is_url(&self) -> bool {
        is_url(&self.target)
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// A file relocation, both sides vault-relative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileMove {
    pub from: String,
    pub to: String,
}

impl FileMove {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// Whether a raw target is an absolute URL that must never be rewritten.
pub fn is_url(target: &str) -> bool {
    let lower = target.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(target: &str, text: &str) -> Link {
        Link {
            link_type: LinkType::Wiki,
            target: target.to_string(),
            text: text.to_string(),
            fragment: None,
            start: 0,
            end: 0,
            image: false,
        }
    }

    #[test]
    fn test_path_part_strips_fragment() {
        assert_eq!(link("note#Heading", "note#Heading").path_part(), "note");
        assert_eq!(link("#Heading", "#Heading").path_part(), "");
        assert_eq!(link("plain", "plain").path_part(), "plain");
    }

    #[test]
    fn test_display_text_falls_back_to_target() {
        assert_eq!(link("note", "").display_text(), "note");
        assert_eq!(link("note", "Alias").display_text(), "Alias");
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com"));
        assert!(is_url("HTTP://EXAMPLE.COM"));
        assert!(is_url("mailto:me@example.com"));
        assert!(!is_url("notes/https.md"));
        assert!(!is_url("ftp-notes.md"));
    }
}
