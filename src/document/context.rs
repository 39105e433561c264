//! Definitions shared across blocks.
//!
//! A link reference definition or a footnote can sit in a different block
//! than the text that uses it. Blocks are rendered one at a time, so the
//! document's definitions travel with each render as a [`RenderContext`].

use std::sync::LazyLock;

use regex::Regex;

use super::types::Segment;

static LINK_DEF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}\[[^\]]+\]:").unwrap());
static FOOTNOTE_DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}\[\^([^\]\s]+)\]:[ \t]?").unwrap());
static FOOTNOTE_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\^([^\]\s]+)\](:?)").unwrap());

/// The document-wide definitions a block may refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Definition blocks as markdown, separated by blank lines
    definitions: String,
    /// Lowercased footnote labels in order of first reference
    footnotes: Vec<String>,
}

impl RenderContext {
    /// Gather the definition blocks among `segments` and number the
    /// footnotes by first reference.
    pub fn collect(segments: &[Segment]) -> Self {
        let mut definitions = Vec::new();
        let mut defined = Vec::new();
        for seg in segments.iter().filter(|seg| is_definition(&seg.source)) {
            definitions.push(seg.source.as_str());
            if let Some(label) = footnote_label(&seg.source) {
                defined.push(label.to_lowercase());
            }
        }

        let mut footnotes: Vec<String> = Vec::new();
        for seg in segments {
            for caps in FOOTNOTE_REF_RE.captures_iter(&seg.source) {
                if !caps[2].is_empty() {
                    continue;
                }
                let label = caps[1].to_lowercase();
                if defined.contains(&label) && !footnotes.contains(&label) {
                    footnotes.push(label);
                }
            }
        }

        Self {
            definitions: definitions.join("\n\n"),
            footnotes,
        }
    }

    pub fn definitions(&self) -> &str {
        &self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 1-based document-wide number of a referenced footnote.
    pub fn footnote_number(&self, label: &str) -> Option<usize> {
        let label = label.to_lowercase();
        self.footnotes.iter().position(|f| *f == label).map(|i| i + 1)
    }
}

/// Whether a block's output may depend on the document's definitions.
pub fn uses_definitions(source: &str) -> bool {
    source.contains('[')
}

/// Label of a footnote definition block.
pub fn footnote_label(source: &str) -> Option<&str> {
    FOOTNOTE_DEF_RE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The content of a footnote definition block, with the `[^label]:` marker
/// and the continuation indent removed. Line structure is kept.
pub fn footnote_body(source: &str) -> String {
    let rest = FOOTNOTE_DEF_RE.find(source).map_or(source, |m| &source[m.end()..]);
    rest.lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { line } else { strip_indent(line, 4) })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_indent(line: &str, max: usize) -> &str {
    let indent = line.bytes().take(max).take_while(|b| *b == b' ').count();
    &line[indent..]
}

/// A footnote definition, or a block made only of link reference
/// definitions.
fn is_definition(source: &str) -> bool {
    footnote_label(source).is_some()
        || source
            .lines()
            .filter(|line| !line.trim().is_empty())
            .all(|line| LINK_DEF_RE.is_match(line))
            && !source.trim().is_empty()
}
