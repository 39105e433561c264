//! Persistent default flags.
//!
//! Defaults are stored as plain flag tokens, one or more per line, in a
//! global config file and an optional `.mdsyncrc` in the working directory.
//! Command-line flags are merged over them with [`ConfigFlags::union`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::highlight::HighlightBackground;
use crate::render::RenderOptions;
use crate::sync::SyncSettings;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Resolve to a highlight background, reading `COLORFGBG` for `Auto`.
    pub fn background(self) -> HighlightBackground {
        match self {
            Self::Auto => HighlightBackground::detect(),
            Self::Light => HighlightBackground::Light,
            Self::Dark => HighlightBackground::Dark,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_wrap: bool,
    pub no_highlight: bool,
    pub allow_html: bool,
    pub perf: bool,
    pub theme: Option<ThemeMode>,
    /// Source pane width in columns
    pub wrap_width: Option<u16>,
    pub edit_debounce_ms: Option<u64>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_wrap: self.no_wrap || other.no_wrap,
            no_highlight: self.no_highlight || other.no_highlight,
            allow_html: self.allow_html || other.allow_html,
            perf: self.perf || other.perf,
            theme: other.theme.or(self.theme),
            wrap_width: other.wrap_width.or(self.wrap_width),
            edit_debounce_ms: other.edit_debounce_ms.or(self.edit_debounce_ms),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }

    /// Sync timing with any configured overrides applied.
    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            edit_debounce_ms: self.edit_debounce_ms.unwrap_or(defaults.edit_debounce_ms),
            ..defaults
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            highlight: !self.no_highlight,
            allow_html: self.allow_html,
            background: self.theme.unwrap_or(ThemeMode::Auto).background(),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("mdsync").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("mdsync")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("mdsync").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("mdsync").join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".mdsyncrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# mdsync defaults (saved with --save)".to_string()];
    let switches = [
        (flags.watch, "--watch"),
        (flags.no_wrap, "--no-wrap"),
        (flags.no_highlight, "--no-highlight"),
        (flags.allow_html, "--allow-html"),
        (flags.perf, "--perf"),
    ];
    lines.extend(
        switches
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, flag)| flag.to_string()),
    );
    if let Some(theme) = flags.theme {
        lines.push(format!("--theme {}", theme.as_str()));
    }
    if let Some(width) = flags.wrap_width {
        lines.push(format!("--wrap-width {width}"));
    }
    if let Some(ms) = flags.edit_debounce_ms {
        lines.push(format!("--edit-debounce-ms {ms}"));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Extract the flags this module knows from a token list; anything else is
/// skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "--watch" => flags.watch = true,
            "--no-wrap" => flags.no_wrap = true,
            "--no-highlight" => flags.no_highlight = true,
            "--allow-html" => flags.allow_html = true,
            "--perf" => flags.perf = true,
            _ => {
                let (name, value) = match token.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => {
                        let next = tokens.get(i + 1).map(String::as_str);
                        if next.is_some() && takes_value(token) {
                            i += 1;
                        }
                        (token, next)
                    }
                };
                if let Some(value) = value {
                    apply_value(&mut flags, name, value);
                }
            }
        }
        i += 1;
    }
    flags
}

fn takes_value(name: &str) -> bool {
    matches!(
        name,
        "--theme" | "--wrap-width" | "--edit-debounce-ms" | "--render-debug-log"
    )
}

fn apply_value(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--theme" => flags.theme = parse_theme(value),
        "--wrap-width" => flags.wrap_width = value.parse().ok(),
        "--edit-debounce-ms" => flags.edit_debounce_ms = value.parse().ok(),
        "--render-debug-log" => flags.render_debug_log = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}
