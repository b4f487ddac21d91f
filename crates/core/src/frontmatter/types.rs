//! Frontmatter types and data structures.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Parsed YAML frontmatter. Field order follows the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontmatter {
    pub fields: Mapping,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of a field, if it is a scalar string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Render a scalar field as text (strings, numbers, booleans).
    pub fn get_display(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Tags from either `tags: [a, b]` or `tags: a`, without leading `#`.
    pub fn tags(&self) -> Vec<String> {
        let strip = |s: &str| s.trim().trim_start_matches('#').to_string();
        match self.get("tags") {
            Some(Value::Sequence(items)) => {
                items.iter().filter_map(Value::as_str).map(strip).collect()
            }
            Some(Value::String(s)) => {
                s.split([',', ' ']).filter(|t| !t.trim().is_empty()).map(strip).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A document split at the frontmatter boundary without interpreting the YAML.
///
/// `block` is the exact text of the frontmatter including both `---` delimiter
/// lines, so `block + body` reproduces the original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    pub block: &'a str,
    pub yaml: &'a str,
    pub body: &'a str,
}

/// Result of splitting and parsing frontmatter from markdown.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Parsed frontmatter (if present).
    pub frontmatter: Option<Frontmatter>,
    /// The exact frontmatter block, empty when there is none.
    pub block: String,
    /// The markdown body (everything after frontmatter).
    pub body: String,
}
