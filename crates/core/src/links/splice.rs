//! Span-based text rewriting.
//!
//! Rewrites are collected as `(span, replacement)` edits against the original
//! text and applied in one pass that copies untouched text between them. Edits
//! are applied as if in descending position order: no edit can shift the
//! offsets of another.

use std::ops::Range;

/// A single replacement of `span` in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Range<usize>,
    pub replacement: String,
}

/// Collects non-overlapping edits and builds the rewritten text.
#[derive(Debug, Default)]
pub struct Splicer {
    edits: Vec<Edit>,
}

impl Splicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a replacement. Returns `false` (and ignores the edit) when it
    /// overlaps an edit already queued.
    pub fn replace(&mut self, span: Range<usize>, replacement: impl Into<String>) -> bool {
        if self.edits.iter().any(|e| span.start < e.span.end && e.span.start < span.end) {
            return false;
        }
        self.edits.push(Edit { span, replacement: replacement.into() });
        true
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Edits sorted by descending start position.
    pub fn edits_descending(&self) -> Vec<&Edit> {
        let mut sorted: Vec<_> = self.edits.iter().collect();
        sorted.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        sorted
    }

    /// Build the rewritten text. Spans outside `original` or not on char
    /// boundaries are skipped.
    pub fn apply(mut self, original: &str) -> String {
        self.edits.sort_by_key(|e| e.span.start);

        let mut out = String::with_capacity(original.len());
        let mut cursor = 0;
        for edit in &self.edits {
            let Range { start, end } = edit.span;
            if start < cursor
                || end > original.len()
                || !original.is_char_boundary(start)
                || !original.is_char_boundary(end)
            {
                continue;
            }
            out.push_str(&original[cursor..start]);
            out.push_str(&edit.replacement);
            cursor = end;
        }
        out.push_str(&original[cursor..]);
        out
    }
}
