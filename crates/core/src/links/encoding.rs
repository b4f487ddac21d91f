//! URL encoding of link targets the way the note editor writes them.

use std::borrow::Cow;

/// Characters that force a markdown link target to be percent-encoded.
const ENCODE_TRIGGERS: &[char] = &[' ', '"', '\'', '[', ']', '(', ')', '#', '<', '>', '%'];

/// Percent-decode a target if it contains `%`. Invalid sequences keep the
/// target as written.
pub fn decode(target: &str) -> Cow<'_, str> {
    if !target.contains('%') {
        return Cow::Borrowed(target);
    }
    match urlencoding::decode(target) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Borrowed(target),
    }
}

/// Whether the editor would encode this path in a markdown link.
pub fn needs_encoding(path: &str) -> bool {
    path.contains(ENCODE_TRIGGERS)
}

/// Encode a vault path for use as a markdown link target, segment by segment
/// so `/` separators survive. Paths without special characters are returned
/// unchanged.
pub fn encode_link_path(path: &str) -> String {
    if !needs_encoding(path) {
        return path.to_string();
    }
    path.split('/')
        .map(|segment| match segment {
            "." | ".." => Cow::Borrowed(segment),
            _ => urlencoding::encode(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Encoded spellings under which a path may appear in existing links.
///
/// Editors differ: some encode only spaces, others encode every reserved
/// character. Both forms are returned (deduplicated, original excluded).
pub fn encoded_variants(path: &str) -> Vec<String> {
    let mut variants = Vec::new();
    for candidate in [path.replace(' ', "%20"), encode_link_path(path)] {
        if candidate != path && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}
