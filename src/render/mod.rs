//! Block rendering to HTML fragments.
//!
//! Every block is converted on its own, so its output depends only on its
//! source text and the document's definitions, and can be reused while
//! neither changes. Structural nodes carry comrak's `data-sourcepos`
//! attribute with lines relative to the block; [`source_line_for`] turns
//! those back into document lines.

use std::sync::LazyLock;

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use regex::{Captures, Regex};
use thiserror::Error;

use crate::document::{
    RenderContext, Rendered, configure_extensions, footnote_body, footnote_label, uses_definitions,
};
use crate::highlight::{HighlightBackground, highlight_html};

/// Failure while converting one block.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write html: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer produced invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("syntax highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
    #[error("{0}")]
    Other(String),
}

/// Converts a block's source text into markup.
pub trait BlockRenderer {
    /// Render one block.
    ///
    /// # Errors
    /// Returns an error when the block cannot be converted; the caller
    /// replaces it with an inline placeholder.
    fn render(&self, source: &str) -> Result<String, RenderError>;

    /// Render one block that may refer to definitions elsewhere in the
    /// document.
    ///
    /// # Errors
    /// Same as [`BlockRenderer::render`].
    fn render_with(&self, source: &str, _context: &RenderContext) -> Result<String, RenderError> {
        self.render(source)
    }
}

impl<R: BlockRenderer + ?Sized> BlockRenderer for &R {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        (**self).render(source)
    }

    fn render_with(&self, source: &str, context: &RenderContext) -> Result<String, RenderError> {
        (**self).render_with(source, context)
    }
}

static FOOTNOTE_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<section[^>]*class="footnotes""#).unwrap());
static FOOTNOTE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"(<a href="#fn-([^"]+)"[^>]*>)(\d+)(</a>)"##).unwrap());

/// Render options for [`HtmlRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Highlight top-level fenced code blocks with syntect
    pub highlight: bool,
    /// Pass raw HTML through instead of omitting it
    pub allow_html: bool,
    pub background: HighlightBackground,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            highlight: true,
            allow_html: false,
            background: HighlightBackground::Dark,
        }
    }
}

/// The comrak-backed block renderer.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    options: RenderOptions,
}

impl HtmlRenderer {
    pub const fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub const fn options(&self) -> RenderOptions {
        self.options
    }

    fn comrak_options(&self) -> Options {
        let mut options = Options::default();
        configure_extensions(&mut options);
        options.extension.header_ids = Some(String::new());
        options.render.sourcepos = true;
        options.render.unsafe_ = self.options.allow_html;
        options
    }

    /// A footnote definition is shown where it is written, labelled with
    /// its document-wide number.
    fn render_footnote(&self, source: &str, label: &str, context: &RenderContext) -> Result<String, RenderError> {
        let body = self.render_with(&footnote_body(source), context)?;
        let marker = context
            .footnote_number(label)
            .map_or_else(|| label.to_string(), |n| n.to_string());
        let lines = source.lines().count().max(1);
        let last = source.lines().last().map_or(1, |line| line.len().max(1));
        Ok(format!(
            "<div class=\"footnote-definition\" id=\"fn-{id}\" data-sourcepos=\"1:1-{lines}:{last}\">\n\
             <sup class=\"footnote-definition-label\">{marker}</sup>\n{body}</div>\n",
            id = escape_html(label),
            marker = escape_html(&marker),
        ))
    }
}

impl BlockRenderer for HtmlRenderer {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        self.render_with(source, &RenderContext::default())
    }

    fn render_with(&self, source: &str, context: &RenderContext) -> Result<String, RenderError> {
        if let Some(label) = footnote_label(source) {
            return self.render_footnote(source, label, context);
        }

        let arena = Arena::new();
        let options = self.comrak_options();
        let mut root = parse_document(&arena, source, &options);

        // Definitions are appended after a blank line, which only a block
        // that cannot swallow them may receive.
        let linked = !context.is_empty() && uses_definitions(source) && closes_at_blank_line(root);
        if linked {
            let joined = format!("{source}\n\n{}", context.definitions());
            root = parse_document(&arena, &joined, &options);
        }

        if self.options.highlight
            && let Some(html) = highlighted_fence(root, self.options.background)?
        {
            return Ok(html);
        }

        let mut out = Vec::new();
        format_html(root, &options, &mut out)?;
        let html = String::from_utf8(out)?;
        Ok(if linked { resolve_footnotes(html, context) } else { html })
    }
}

/// Whether every top-level node ends at the next blank line.
fn closes_at_blank_line<'a>(root: &'a AstNode<'a>) -> bool {
    root.children().all(|node| {
        !matches!(
            node.data.borrow().value,
            NodeValue::CodeBlock(_) | NodeValue::HtmlBlock(_)
        )
    })
}

/// Drop the footnote list comrak appends and number each footnote
/// reference by its position in the whole document.
fn resolve_footnotes(mut html: String, context: &RenderContext) -> String {
    if let Some(section) = FOOTNOTE_SECTION_RE.find(&html) {
        html.truncate(section.start());
    }
    FOOTNOTE_LINK_RE
        .replace_all(&html, |caps: &Captures| match context.footnote_number(&caps[2]) {
            Some(n) => format!("{}{n}{}", &caps[1], &caps[4]),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render a block whose only node is a fenced code block with a known
/// language; `None` for anything else.
fn highlighted_fence<'a>(
    root: &'a AstNode<'a>,
    background: HighlightBackground,
) -> Result<Option<String>, RenderError> {
    let Some(node) = root.first_child() else {
        return Ok(None);
    };
    if node.next_sibling().is_some() {
        return Ok(None);
    }
    let data = node.data.borrow();
    let NodeValue::CodeBlock(ref block) = data.value else {
        return Ok(None);
    };
    let Some(language) = block.info.split_whitespace().next() else {
        return Ok(None);
    };
    if !block.fenced {
        return Ok(None);
    }
    let Some(inner) = highlight_html(language, &block.literal, background)? else {
        return Ok(None);
    };
    let pos = data.sourcepos;
    Ok(Some(format!(
        "<pre data-sourcepos=\"{}:{}-{}:{}\" class=\"md-code\" data-lang=\"{}\"><code>{inner}</code></pre>\n",
        pos.start.line,
        pos.start.column,
        pos.end.line,
        pos.end.column,
        escape_html(language),
    )))
}

/// Render one block, turning a failure into an inline placeholder.
pub fn render_block<R: BlockRenderer + ?Sized>(renderer: &R, source: &str, context: &RenderContext) -> Rendered {
    match renderer.render_with(source, context) {
        Ok(html) => Rendered::ok(html),
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(target: "mdsync::render", error = %message, "block render failed");
            crate::perf::log_event("render.error", &message);
            Rendered {
                html: error_placeholder(&message),
                error: Some(message),
            }
        }
    }
}

/// The inline markup shown in place of a block that failed to render.
pub fn error_placeholder(message: &str) -> String {
    format!(
        "<div class=\"md-render-error\" role=\"alert\">{}</div>\n",
        escape_html(message)
    )
}

/// Map a `data-sourcepos` value from a block's output to a document line.
///
/// `block_start` is the block's first line in the document.
///
/// ```
/// use mdsync::render::source_line_for;
///
/// assert_eq!(source_line_for(10, "3:1-4:7"), Some(12));
/// assert_eq!(source_line_for(10, "garbage"), None);
/// ```
pub fn source_line_for(block_start: usize, sourcepos: &str) -> Option<usize> {
    let (line, _) = sourcepos.split_once(':')?;
    let relative: usize = line.trim().parse().ok()?;
    if relative == 0 {
        return None;
    }
    Some(block_start + relative - 1)
}

/// Wrap an assembled document body in a self-contained HTML page.
pub fn standalone_page(title: &str, body: &str, background: HighlightBackground) -> String {
    let (fg, bg, code_bg) = match background {
        HighlightBackground::Light => ("#1f2328", "#ffffff", "#f6f8fa"),
        HighlightBackground::Dark => ("#e6edf3", "#0d1117", "#161b22"),
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n\
         body {{ color: {fg}; background: {bg}; max-width: 52rem; margin: 0 auto; padding: 1rem; \
         font-family: system-ui, sans-serif; line-height: 1.5; }}\n\
         .md-block {{ margin-bottom: 1rem; }}\n\
         pre {{ background: {code_bg}; padding: 0.75rem; overflow-x: auto; }}\n\
         .md-render-error {{ border-left: 4px solid #d1242f; padding: 0.5rem; font-family: monospace; }}\n\
         </style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> String {
        HtmlRenderer::default().render(source).unwrap()
    }

    struct FailOn(&'static str);

    impl BlockRenderer for FailOn {
        fn render(&self, source: &str) -> Result<String, RenderError> {
            if source.contains(self.0) {
                return Err(RenderError::Other(format!("cannot render <{}>", self.0)));
            }
            HtmlRenderer::default().render(source)
        }
    }

    #[test]
    fn test_heading_carries_sourcepos() {
        let html = render("# Title");
        assert!(html.contains("<h1"));
        assert!(html.contains("data-sourcepos=\"1:1-1:7\""));
        assert!(html.contains("Title"));
    }

    #[test]
    fn test_list_items_are_tagged() {
        let html = render("- one\n- two");
        assert!(html.contains("<ul data-sourcepos=\"1:1-2:5\""));
        assert!(html.contains("<li data-sourcepos=\"2:1-2:5\""));
    }

    #[test]
    fn test_gfm_table_renders() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table"));
        assert!(html.contains("<td"));
    }

    #[test]
    fn test_raw_html_is_omitted_by_default() {
        let html = render("<div>raw</div>");
        assert!(!html.contains("<div>raw</div>"));
    }

    #[test]
    fn test_raw_html_passes_when_allowed() {
        let renderer = HtmlRenderer::new(RenderOptions {
            allow_html: true,
            ..RenderOptions::default()
        });
        let html = renderer.render("<div>raw</div>").unwrap();
        assert!(html.contains("<div>raw</div>"));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = render("```rust\nfn main() {}\n```");
        assert!(html.starts_with("<pre data-sourcepos=\"1:1-3:3\" class=\"md-code\""));
        assert!(html.contains("data-lang=\"rust\""));
        assert!(html.contains("<span style="));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain_code() {
        let html = render("```nope-lang\nx\n```");
        assert!(html.contains("<code class=\"language-nope-lang\">"));
    }

    #[test]
    fn test_highlighting_can_be_disabled() {
        let renderer = HtmlRenderer::new(RenderOptions {
            highlight: false,
            ..RenderOptions::default()
        });
        let html = renderer.render("```rust\nfn main() {}\n```").unwrap();
        assert!(html.contains("<code class=\"language-rust\">"));
        assert!(!html.contains("<span style="));
    }

    #[test]
    fn test_render_block_contains_failure() {
        let rendered = render_block(&FailOn("boom"), "boom here", &RenderContext::default());
        assert!(rendered.is_error());
        assert!(rendered.html.contains("md-render-error"));
        assert!(rendered.html.contains("cannot render &lt;boom&gt;"));
        assert_eq!(rendered.error.as_deref(), Some("cannot render <boom>"));
    }

    #[test]
    fn test_render_block_passes_success_through() {
        let rendered = render_block(&FailOn("boom"), "fine", &RenderContext::default());
        assert!(!rendered.is_error());
        assert!(rendered.html.contains("<p"));
    }

    fn render_in(document: &str, block: usize) -> String {
        let segments = crate::document::segment(document);
        let context = RenderContext::collect(&segments);
        HtmlRenderer::default()
            .render_with(&segments[block].source, &context)
            .unwrap()
    }

    #[test]
    fn test_reference_link_resolves_from_another_block() {
        let html = render_in("See [docs][1].\n\n[1]: https://example.com\n", 0);
        assert!(html.contains("href=\"https://example.com\""));
        assert!(html.contains(">docs</a>"));
        assert!(!html.contains("[docs]"));
    }

    #[test]
    fn test_footnote_reference_is_numbered_without_a_list() {
        let html = render_in("a[^x] b[^y]\n\n[^y]: why\n\n[^x]: ex\n", 0);
        assert!(html.contains("href=\"#fn-x\""));
        assert!(html.contains("href=\"#fn-y\""));
        assert!(!html.contains("[^x]"));
        assert!(!html.contains("<section"));
        assert!(!html.contains("why"));
    }

    #[test]
    fn test_footnote_definition_renders_in_place() {
        let html = render_in("note[^n]\n\n[^n]: a *footnote*\n", 1);
        assert!(html.starts_with("<div class=\"footnote-definition\" id=\"fn-n\" data-sourcepos=\"1:1-1:"));
        assert!(html.contains("<sup class=\"footnote-definition-label\">1</sup>"));
        assert!(html.contains("<em>footnote</em>"));
    }

    #[test]
    fn test_footnote_definition_without_reference_shows_label() {
        let html = render("[^lonely]: never cited");
        assert!(html.contains(">lonely</sup>"));
        assert!(html.contains("never cited"));
    }

    #[test]
    fn test_definitions_do_not_leak_into_code() {
        let html = render_in("```\n[docs][1]\n```\n\n[1]: https://example.com\n", 0);
        assert!(html.contains("[docs][1]"));
        assert!(!html.contains("href="));
    }

    #[test]
    fn test_source_line_for_first_line() {
        assert_eq!(source_line_for(5, "1:1-1:3"), Some(5));
    }

    #[test]
    fn test_source_line_for_rejects_zero() {
        assert_eq!(source_line_for(5, "0:0-0:0"), None);
    }

    #[test]
    fn test_escape_html_covers_quotes() {
        assert_eq!(escape_html("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&#39;");
    }

    #[test]
    fn test_standalone_page_escapes_title_and_keeps_body() {
        let page = standalone_page("a <b>", "<div class=\"md-block\"></div>\n", HighlightBackground::Light);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>a &lt;b&gt;</title>"));
        assert!(page.contains("<div class=\"md-block\"></div>"));
        assert!(page.contains("#ffffff"));
    }
}
