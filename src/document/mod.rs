//! Document segmentation and incremental rendering.
//!
//! This module handles:
//! - Splitting markdown into top-level blocks with comrak
//! - Collecting link and footnote definitions shared between blocks
//! - Classifying block positions between two versions
//! - Keeping the rendered block list, re-rendering only what changed

mod context;
mod diff;
mod segment;
mod store;
mod types;

pub use context::{RenderContext, footnote_body, footnote_label, uses_definitions};
pub use diff::{DiffSummary, diff_blocks};
pub(crate) use segment::configure_extensions;
pub use segment::{line_count, segment};
pub use store::{BlockStore, RenderPass};
pub use types::{Block, BlockChange, HasSource, LineRange, Rendered, Segment, block_id};

/// Code file extensions that are shown as a single fenced block.
const CODE_EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("go", "go"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("java", "java"),
    ("sh", "bash"),
    ("toml", "toml"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
];

/// Prepare file content for the editor based on its extension.
///
/// Recognized source files are wrapped in a fenced code block so the preview
/// highlights them. Markdown and unrecognized files pass through unchanged.
pub fn prepare_content(file_path: &std::path::Path, content: String) -> String {
    let language = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| {
            CODE_EXTENSIONS
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, lang)| *lang)
        });
    let Some(language) = language else {
        return content;
    };
    let content = content.strip_suffix('\n').unwrap_or(&content);
    format!("```{language}\n{content}\n```\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_prepare_content_wraps_rust_file() {
        let result = prepare_content(Path::new("main.rs"), "fn main() {}\n".to_string());
        assert_eq!(result, "```rust\nfn main() {}\n```\n");
    }

    #[test]
    fn test_prepare_content_passes_markdown_through() {
        let content = "# Hello\nworld".to_string();
        let result = prepare_content(Path::new("README.md"), content.clone());
        assert_eq!(result, content);
    }

    #[test]
    fn test_prepare_content_passes_unknown_through() {
        let content = "some data".to_string();
        let result = prepare_content(Path::new("data.xyz"), content.clone());
        assert_eq!(result, content);
    }

    #[test]
    fn test_prepare_content_extension_case_insensitive() {
        let result = prepare_content(Path::new("script.PY"), "print(1)".to_string());
        assert!(result.starts_with("```python\n"));
    }

    #[test]
    fn test_wrapped_source_file_is_one_block() {
        let md = prepare_content(Path::new("lib.rs"), "fn a() {}\n\nfn b() {}\n".to_string());
        let blocks = segment(&md);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].lines, LineRange::new(1, 5));
    }
}
