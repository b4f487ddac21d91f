//! Export selection queries.
//!
//! A query is a whitespace-separated list of terms that must all hold:
//!
//! - `path:<glob>` or a bare glob: vault-relative path matches the glob
//! - `tag:<tag>`: the frontmatter tags contain `tag` (or a `tag/...` child)
//! - `<field>=<value>`: a frontmatter scalar, or any item of a list, equals `value`
//!
//! Several queries select the union of their matches.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use globset::GlobMatcher;
use serde_yaml::Value;
use thiserror::Error;

use crate::vault::VaultFile;
use crate::vault::walker::path_glob;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("empty selection query")]
    EmptyQuery,

    #[error("invalid glob '{0}': {1}")]
    BadGlob(String, #[source] globset::Error),

    #[error("invalid query term '{0}'")]
    BadTerm(String),
}

#[derive(Debug, Clone)]
enum Term {
    Path(GlobMatcher),
    Tag(String),
    Field { key: String, value: String },
}

impl Term {
    fn parse(raw: &str) -> Result<Self, SelectionError> {
        if let Some(glob) = raw.strip_prefix("path:") {
            return path_term(glob);
        }
        if let Some(tag) = raw.strip_prefix("tag:") {
            let tag = tag.trim_start_matches('#');
            if tag.is_empty() {
                return Err(SelectionError::BadTerm(raw.to_string()));
            }
            return Ok(Term::Tag(tag.to_lowercase()));
        }
        if let Some((key, value)) = raw.split_once('=') {
            if key.is_empty() {
                return Err(SelectionError::BadTerm(raw.to_string()));
            }
            return Ok(Term::Field { key: key.to_string(), value: value.to_string() });
        }
        path_term(raw)
    }

    fn matches(&self, file: &VaultFile) -> bool {
        match self {
            Term::Path(glob) => glob.is_match(&file.relative_path),
            Term::Tag(tag) => file.tags().iter().any(|t| {
                let t = t.to_lowercase();
                t == *tag || t.strip_prefix(tag.as_str()).is_some_and(|rest| rest.starts_with('/'))
            }),
            Term::Field { key, value } => {
                let Some(fm) = &file.frontmatter else { return false };
                match fm.get(key) {
                    Some(Value::Sequence(items)) => items.iter().any(|item| scalar_eq(item, value)),
                    Some(other) => scalar_eq(other, value),
                    None => false,
                }
            }
        }
    }
}

fn path_term(glob: &str) -> Result<Term, SelectionError> {
    if glob.is_empty() {
        return Err(SelectionError::BadTerm("path:".to_string()));
    }
    let glob = glob.trim_start_matches('/');
    path_glob(glob)
        .map(|g| Term::Path(g.compile_matcher()))
        .map_err(|e| SelectionError::BadGlob(glob.to_string(), e))
}

fn scalar_eq(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        _ => false,
    }
}

/// One AND-ed query.
#[derive(Debug, Clone)]
pub struct SelectionQuery {
    source: String,
    terms: Vec<Term>,
}

impl SelectionQuery {
    pub fn parse(query: &str) -> Result<Self, SelectionError> {
        let terms = query.split_whitespace().map(Term::parse).collect::<Result<Vec<_>, _>>()?;
        if terms.is_empty() {
            return Err(SelectionError::EmptyQuery);
        }
        Ok(Self { source: query.trim().to_string(), terms })
    }

    pub fn matches(&self, file: &VaultFile) -> bool {
        self.terms.iter().all(|t| t.matches(file))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for SelectionQuery {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Union of queries. With no queries every file is selected.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    queries: Vec<SelectionQuery>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(queries: &[S]) -> Result<Self, SelectionError> {
        let queries = queries
            .iter()
            .map(|q| SelectionQuery::parse(q.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { queries })
    }

    pub fn matches(&self, file: &VaultFile) -> bool {
        self.queries.is_empty() || self.queries.iter().any(|q| q.matches(file))
    }

    /// Relative paths of the matching files.
    pub fn select<'a, I>(&self, files: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a VaultFile>,
    {
        files.into_iter().filter(|f| self.matches(f)).map(|f| f.relative_path.clone()).collect()
    }
}
