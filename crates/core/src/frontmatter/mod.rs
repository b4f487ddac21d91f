//! Frontmatter splitting and parsing.
//!
//! Only what the link engine needs: the exact frontmatter block (so that
//! rewritten files keep their YAML byte-for-byte) and read access to fields
//! such as `url`, `tags` or `title`.

pub mod parser;
pub mod types;

pub use parser::{FrontmatterParseError, parse, split};
pub use types::{Frontmatter, ParsedDocument, SplitDocument};
