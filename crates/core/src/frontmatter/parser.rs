//! Frontmatter parsing from markdown documents.

use super::types::{Frontmatter, ParsedDocument, SplitDocument};
use thiserror::Error;

/// Errors that can occur during frontmatter parsing.
#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Split a document into its frontmatter block and body.
///
/// Frontmatter must start on the very first line:
/// ```markdown
/// ---
/// key: value
/// ---
/// # Document content
/// ```
/// A missing closing delimiter means there is no frontmatter.
pub fn split(content: &str) -> SplitDocument<'_> {
    let no_frontmatter = SplitDocument { block: "", yaml: "", body: content };

    let after_open = match content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return no_frontmatter,
    };
    let open_len = content.len() - after_open.len();

    match find_closing_delimiter(after_open) {
        Some((yaml_end, block_end)) => {
            let split_at = open_len + block_end;
            SplitDocument {
                block: &content[..split_at],
                yaml: &after_open[..yaml_end],
                body: &content[split_at..],
            }
        }
        None => no_frontmatter,
    }
}

/// Parse frontmatter from markdown content.
pub fn parse(content: &str) -> Result<ParsedDocument, FrontmatterParseError> {
    let doc = split(content);

    if doc.block.is_empty() {
        return Ok(ParsedDocument {
            frontmatter: None,
            block: String::new(),
            body: content.to_string(),
        });
    }

    let frontmatter: Frontmatter = if doc.yaml.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(doc.yaml)?
    };

    Ok(ParsedDocument {
        frontmatter: Some(frontmatter),
        block: doc.block.to_string(),
        body: doc.body.to_string(),
    })
}

/// Find the closing `---` line. Returns the byte offset where it starts and
/// the offset just past its line terminator.
fn find_closing_delimiter(content: &str) -> Option<(usize, usize)> {
    let mut pos = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((pos, pos + line.len()));
        }
        pos += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_frontmatter() {
        let content = "# Hello\n\nSome content";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.is_none());
        assert_eq!(result.block, "");
        assert_eq!(result.body, content);
    }

    #[test]
    fn parse_simple_frontmatter() {
        let content = "---\ntitle: Hello\n---\n# Content";
        let result = parse(content).unwrap();
        let fm = result.frontmatter.unwrap();
        assert_eq!(fm.get_str("title"), Some("Hello"));
        assert_eq!(result.block, "---\ntitle: Hello\n---\n");
        assert_eq!(result.body, "# Content");
    }

    #[test]
    fn parse_preserves_field_order() {
        let content = "---\nzeta: 1\nalpha: 2\nmid: 3\n---\nBody";
        let fm = parse(content).unwrap().frontmatter.unwrap();
        let keys: Vec<_> = fm.fields.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn parse_empty_frontmatter() {
        let content = "---\n---\n# Content";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.unwrap().is_empty());
        assert_eq!(result.body, "# Content");
    }

    #[test]
    fn split_roundtrips_exact_bytes() {
        let content = "---\r\ntags: [a, b]\r\n---\r\n\r\nBody [[x]]\r\n";
        let doc = split(content);
        assert_eq!(format!("{}{}", doc.block, doc.body), content);
        assert_eq!(doc.body, "\r\nBody [[x]]\r\n");
    }

    #[test]
    fn split_unclosed_frontmatter_is_body() {
        let content = "---\ntitle: nope\nno closing";
        let doc = split(content);
        assert_eq!(doc.block, "");
        assert_eq!(doc.body, content);
    }

    #[test]
    fn parse_invalid_yaml_errors() {
        let content = "---\ntitle: [unclosed\n---\nBody";
        assert!(parse(content).is_err());
    }

    #[test]
    fn tags_from_list_and_string() {
        let fm = parse("---\ntags: [rust, '#cli']\n---\n").unwrap().frontmatter.unwrap();
        assert_eq!(fm.tags(), vec!["rust", "cli"]);

        let fm = parse("---\ntags: one, two\n---\n").unwrap().frontmatter.unwrap();
        assert_eq!(fm.tags(), vec!["one", "two"]);
    }
}
