//! Link extraction with exact byte positions.
//!
//! Scans a document body for wiki-links, embeds and markdown links. Links
//! inside fenced code blocks and inline code spans are ignored. The result is
//! ordered by position, so it can be fed straight into a rewrite.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::types::{Link, LinkType};

// Captures:
// 1: "!" for embeds
// 2: target (may include #fragment)
// 3: alias (if present)
static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[\[([^\[\]|\n]+)(?:\|([^\[\]\n]*))?\]\]").expect("valid wikilink regex")
});

// Captures:
// 1: "!" for images
// 2: link text
// 3: target wrapped in <...>
// 4: bare target (one level of balanced parentheses allowed)
static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[([^\[\]\n]*)\]\((?:<([^<>\n]+)>|([^()\s]+(?:\([^()\s]*\)[^()\s]*)*))\)")
        .expect("valid markdown link regex")
});

/// Extract every link from a document body, ordered by start position.
pub fn extract_links(body: &str) -> Vec<Link> {
    let code = code_ranges(body);
    let in_code = |pos: usize| code.iter().any(|r| r.contains(&pos));

    let mut links = Vec::new();

    for cap in WIKILINK_RE.captures_iter(body) {
        let Some(full) = cap.get(0) else { continue };
        if in_code(full.start()) {
            continue;
        }

        // Inside tables the alias pipe is escaped: [[note\|alias]]
        let target = cap[2].trim_end_matches('\\').trim().to_string();
        if target.is_empty() {
            continue;
        }
        let text = cap.get(3).map_or_else(|| target.clone(), |m| m.as_str().to_string());
        let link_type = if cap[1].is_empty() { LinkType::Wiki } else { LinkType::Embed };

        links.push(Link {
            link_type,
            fragment: fragment_of(&target),
            target,
            text,
            start: full.start(),
            end: full.end(),
            image: false,
        });
    }

    let wiki_spans: Vec<Range<usize>> = links.iter().map(Link::span).collect();
    let overlaps_wiki =
        |span: &Range<usize>| wiki_spans.iter().any(|w| span.start < w.end && w.start < span.end);

    for cap in MARKDOWN_LINK_RE.captures_iter(body) {
        let Some(full) = cap.get(0) else { continue };
        if in_code(full.start()) || overlaps_wiki(&full.range()) {
            continue;
        }

        let Some(target) = cap.get(3).or_else(|| cap.get(4)) else { continue };
        let target = target.as_str().trim().to_string();

        links.push(Link {
            link_type: LinkType::Markdown,
            fragment: fragment_of(&target),
            target,
            text: cap[2].to_string(),
            start: full.start(),
            end: full.end(),
            image: !cap[1].is_empty(),
        });
    }

    links.sort_by_key(|l| l.start);
    links
}

fn fragment_of(target: &str) -> Option<String> {
    target.find('#').map(|pos| target[pos + 1..].to_string()).filter(|f| !f.is_empty())
}

/// Byte ranges covered by fenced code blocks and inline code spans.
fn code_ranges(body: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut fence: Option<(usize, char, usize)> = None;
    let mut pos = 0;
    let mut prose_start = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map_or(0, |c| trimmed.chars().take_while(|x| *x == c).count());

        match (fence, marker) {
            (None, Some(c)) if indent <= 3 && run >= 3 => {
                inline_code_ranges(body, prose_start..pos, &mut ranges);
                fence = Some((pos, c, run));
            }
            (Some((start, c, len)), Some(m))
                if m == c && run >= len && trimmed[run..].trim().is_empty() =>
            {
                ranges.push(start..pos + line.len());
                fence = None;
                prose_start = pos + line.len();
            }
            _ => {}
        }
        pos += line.len();
    }

    match fence {
        Some((start, _, _)) => ranges.push(start..body.len()),
        None => inline_code_ranges(body, prose_start..body.len(), &mut ranges),
    }

    ranges
}

/// Inline code spans: a run of N backticks closed by the next run of exactly N.
fn inline_code_ranges(body: &str, within: Range<usize>, out: &mut Vec<Range<usize>>) {
    let bytes = body.as_bytes();
    let mut i = within.start;

    while i < within.end {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_start = i;
        while i < within.end && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - open_start;

        let mut j = i;
        let mut closed = None;
        while j < within.end {
            if bytes[j] == b'`' {
                let close_start = j;
                while j < within.end && bytes[j] == b'`' {
                    j += 1;
                }
                if j - close_start == run {
                    closed = Some(j);
                    break;
                }
            } else {
                j += 1;
            }
        }

        // Unmatched backticks are literal text.
        if let Some(end) = closed {
            out.push(open_start..end);
            i = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_wikilinks() {
        let body =
            "This links to [[other-note]] and [[another|with alias]].\nAlso [[path/to/note]].";
        let links = extract_links(body);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].target, "other-note");
        assert_eq!(links[0].text, "other-note");
        assert_eq!(links[0].link_type, LinkType::Wiki);
        assert_eq!(&body[links[0].span()], "[[other-note]]");

        assert_eq!(links[1].target, "another");
        assert_eq!(links[1].text, "with alias");
        assert!(links[1].has_alias());

        assert_eq!(links[2].target, "path/to/note");
    }

    #[test]
    fn test_extract_embed() {
        let body = "Diagram: ![[diagram.png|300]]";
        let links = extract_links(body);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Embed);
        assert_eq!(links[0].target, "diagram.png");
        assert_eq!(links[0].text, "300");
        assert_eq!(links[0].start, 9);
    }

    #[test]
    fn test_extract_markdown_links() {
        let body =
            "See [this note](./other.md) and [site](https://example.com).\n![pic](img/a%20b.png)";
        let links = extract_links(body);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].target, "./other.md");
        assert_eq!(links[0].text, "this note");
        assert_eq!(links[0].link_type, LinkType::Markdown);
        assert!(links[1].is_url());
        assert!(links[2].image);
        assert_eq!(links[2].target, "img/a%20b.png");
    }

    #[test]
    fn test_angle_bracket_target() {
        let links = extract_links("[doc](<my file.md>)");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "my file.md");
    }

    #[test]
    fn test_balanced_parens_in_target() {
        let links = extract_links("[wiki](Rust_(language).md) tail");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Rust_(language).md");
    }

    #[test]
    fn test_fragment_parsing() {
        let links = extract_links("[[note#Section|alias]] [[#Local]] [a](b.md#frag)");
        assert_eq!(links[0].fragment.as_deref(), Some("Section"));
        assert_eq!(links[0].path_part(), "note");
        assert_eq!(links[1].path_part(), "");
        assert_eq!(links[2].fragment.as_deref(), Some("frag"));
    }

    #[test]
    fn test_skips_fenced_code() {
        let body = "```\n[[CodeLink]]\n```\nOutside [[RealLink]]\n~~~md\n[x](y.md)\n~~~\n";
        let links = extract_links(body);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "RealLink");
    }

    #[test]
    fn test_skips_inline_code() {
        let links = extract_links("See `[[Fake]]` but [[Real]] and ``[a](b.md)``");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Real");
    }

    #[test]
    fn test_unclosed_fence_swallows_rest() {
        let links = extract_links("[[before]]\n```\n[[inside]]\n");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "before");
    }

    #[test]
    fn test_escaped_pipe_in_table() {
        let links = extract_links("| [[note\\|Alias]] |");
        assert_eq!(links[0].target, "note");
        assert_eq!(links[0].text, "Alias");
    }

    #[test]
    fn test_positions_are_byte_offsets_with_multibyte_text() {
        let body = "Café → [[Über]]";
        let links = extract_links(body);
        assert_eq!(&body[links[0].span()], "[[Über]]");
    }

    #[test]
    fn test_ordered_by_position() {
        let links = extract_links("[md](a.md) then [[wiki]] then ![[embed.png]]");
        let starts: Vec<_> = links.iter().map(|l| l.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(links.len(), 3);
    }
}
