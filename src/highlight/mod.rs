//! Syntax highlighting for fenced code blocks.
//!
//! Uses syntect with Sublime Text syntax definitions and emits inline-styled
//! HTML spans.

use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Background the highlighted code is shown on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    #[default]
    Dark,
}

impl HighlightBackground {
    /// Guess the background from the `COLORFGBG` environment variable.
    pub fn detect() -> Self {
        background_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
    }
}

/// Highlight `code` as `language` into HTML spans.
///
/// Returns `Ok(None)` when no syntax matches the language token, so the
/// caller can fall back to plain rendering.
///
/// # Errors
/// Returns an error if syntect fails to parse or style a line.
pub fn highlight_html(
    language: &str,
    code: &str,
    background: HighlightBackground,
) -> Result<Option<String>, syntect::Error> {
    let syntax_set = syntax_set();
    let syntax = syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language));
    let Some(syntax) = syntax else {
        return Ok(None);
    };

    let mut highlighter = HighlightLines::new(syntax, theme(background));
    let mut html = String::new();
    for line in LinesWithEndings::from(code) {
        let regions = highlighter.highlight_line(line, syntax_set)?;
        html.push_str(&styled_line_to_highlighted_html(
            &regions[..],
            IncludeBackground::No,
        )?);
    }
    Ok(Some(html))
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme(background: HighlightBackground) -> &'static Theme {
    static DARK: OnceLock<Theme> = OnceLock::new();
    static LIGHT: OnceLock<Theme> = OnceLock::new();
    let (cell, preferred) = match background {
        HighlightBackground::Dark => (
            &DARK,
            [
                "base16-ocean.dark",
                "Solarized (dark)",
                "base16-eighties.dark",
            ]
            .as_slice(),
        ),
        HighlightBackground::Light => (
            &LIGHT,
            ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"].as_slice(),
        ),
    };
    cell.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        for name in preferred {
            if let Some(theme) = theme_set.themes.get(*name) {
                return theme.clone();
            }
        }
        theme_set
            .themes
            .values()
            .next()
            .cloned()
            .unwrap_or_default()
    })
}

fn background_from_colorfgbg(colorfgbg: Option<&str>) -> HighlightBackground {
    let Some(value) = colorfgbg else {
        return HighlightBackground::Dark;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return HighlightBackground::Dark;
    };

    if bg >= 7 {
        HighlightBackground::Light
    } else {
        HighlightBackground::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_rust_produces_styled_spans() {
        let code = "fn main() {\n    let x = 1;\n}\n";
        let html = highlight_html("rust", code, HighlightBackground::Dark)
            .unwrap()
            .expect("rust syntax");
        assert!(html.contains("<span style=\"color:"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_highlight_unknown_language_is_none() {
        let result = highlight_html("nope-not-a-language", "x", HighlightBackground::Dark).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_highlight_escapes_markup() {
        let html = highlight_html("rust", "let s = \"<b>\";\n", HighlightBackground::Light)
            .unwrap()
            .expect("rust syntax");
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_highlight_does_not_set_background_color() {
        let html = highlight_html("rust", "fn main() {}\n", HighlightBackground::Dark)
            .unwrap()
            .expect("rust syntax");
        assert!(!html.contains("background-color"));
    }

    #[test]
    fn test_colorfgbg_dark_background() {
        assert_eq!(
            background_from_colorfgbg(Some("15;0")),
            HighlightBackground::Dark
        );
    }

    #[test]
    fn test_colorfgbg_light_background() {
        assert_eq!(
            background_from_colorfgbg(Some("0;15")),
            HighlightBackground::Light
        );
    }

    #[test]
    fn test_colorfgbg_missing_defaults_dark() {
        assert_eq!(background_from_colorfgbg(None), HighlightBackground::Dark);
    }
}
