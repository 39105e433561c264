//! Core document types.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Serialize;

/// A 1-indexed, inclusive span of source lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Create a range; `end` is clamped so the range is never inverted.
    pub const fn new(start: usize, end: usize) -> Self {
        let end = if end < start { start } else { end };
        Self { start, end }
    }

    /// Number of lines in the range.
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A line range always holds at least one line.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check if a 1-indexed line falls inside the range.
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One top-level structural unit found by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Exact document text for `lines`, without the final line terminator
    pub source: String,
    /// Span reported by the markdown parser
    pub lines: LineRange,
    /// `lines` widened over the blank lines up to the next segment
    pub extent: LineRange,
}

/// Classification of one position when comparing two block lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockChange {
    Add,
    Remove,
    Update,
    Keep,
}

impl BlockChange {
    /// Whether this position needs a fresh render.
    pub const fn needs_render(self) -> bool {
        matches!(self, Self::Add | Self::Update)
    }
}

impl fmt::Display for BlockChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
            Self::Keep => "keep",
        };
        f.write_str(label)
    }
}

/// Output of rendering one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    /// HTML fragment (the error placeholder when `error` is set)
    pub html: String,
    /// Message of the failure that produced a placeholder
    pub error: Option<String>,
}

impl Rendered {
    pub const fn ok(html: String) -> Self {
        Self { html, error: None }
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A segment together with its identity and its last render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Stable id: ordinal plus a hash of `(source, lines.start)`
    pub id: String,
    pub source: String,
    pub lines: LineRange,
    pub extent: LineRange,
    pub rendered: Rendered,
}

impl Block {
    /// Build a block at `ordinal` from a segment and its render.
    pub fn new(ordinal: usize, segment: Segment, rendered: Rendered) -> Self {
        Self {
            id: block_id(ordinal, &segment.source, segment.lines.start),
            source: segment.source,
            lines: segment.lines,
            extent: segment.extent,
            rendered,
        }
    }
}

/// Derive a block id from its content, start line and position.
///
/// Duplicate content at different positions still gets distinct ids
/// because the ordinal is part of the id.
pub fn block_id(ordinal: usize, source: &str, start_line: usize) -> String {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    start_line.hash(&mut hasher);
    format!("b{ordinal}-{:016x}", hasher.finish())
}

/// Anything the differ can compare by source text.
pub trait HasSource {
    fn source(&self) -> &str;
}

impl HasSource for Segment {
    fn source(&self) -> &str {
        &self.source
    }
}

impl HasSource for Block {
    fn source(&self) -> &str {
        &self.source
    }
}

impl HasSource for &str {
    fn source(&self) -> &str {
        self
    }
}

impl HasSource for String {
    fn source(&self) -> &str {
        self
    }
}
