//! mdsync - incremental markdown rendering with synchronized scrolling.
//!
//! # Usage
//!
//! ```bash
//! mdsync segment README.md
//! mdsync render README.md -o README.html
//! mdsync diff old.md new.md --json
//! mdsync map README.md --from preview --at 1200
//! mdsync watch README.md -o README.html
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use mdsync::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use mdsync::document::{BlockStore, DiffSummary, LineRange, block_id, diff_blocks, prepare_content, segment};
use mdsync::perf;
use mdsync::render::{HtmlRenderer, standalone_page};
use mdsync::session::Session;
use mdsync::sync::{Clock, SystemClock};
use mdsync::viewport::Pane;
use mdsync::watcher::FileWatcher;

/// Width of one source column in the headless layouts, in pixels.
const COLUMN_PX: f64 = 8.0;

/// Incremental markdown rendering with synchronized source/preview scrolling
#[derive(Parser, Debug)]
#[command(name = "mdsync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Syntax highlight theme background
    #[arg(long, value_enum, global = true)]
    theme: Option<ThemeMode>,

    /// Render fenced code without syntax highlighting
    #[arg(long, global = true)]
    no_highlight: bool,

    /// Pass raw HTML in the document through to the output
    #[arg(long, global = true)]
    allow_html: bool,

    /// Keep watching after `render -o` and re-render on change
    #[arg(long, global = true)]
    watch: bool,

    /// Do not wrap long lines in the source view
    #[arg(long, global = true)]
    no_wrap: bool,

    /// Source view width in columns
    #[arg(long, value_name = "COLS", global = true)]
    wrap_width: Option<u16>,

    /// Quiet time after an edit before re-rendering
    #[arg(long, value_name = "MS", global = true)]
    edit_debounce_ms: Option<u64>,

    /// Print timing of render passes and measurements
    #[arg(long, global = true)]
    perf: bool,

    /// Write detailed render/measure debug events to a file
    #[arg(long, value_name = "PATH", global = true)]
    render_debug_log: Option<PathBuf>,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Save current command-line flags as defaults
    #[arg(long, global = true)]
    save: bool,

    /// Clear saved defaults
    #[arg(long, global = true)]
    clear: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the document's top-level blocks
    Segment {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Render the document to a standalone HTML page
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// Classify block positions between two versions of a document
    Diff {
        #[arg(value_name = "OLD")]
        old: PathBuf,
        #[arg(value_name = "NEW")]
        new: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Lay the document out in both views and map a scroll offset
    Map {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// View the offset is in
        #[arg(long, value_enum)]
        from: PaneArg,
        /// Scroll offset in pixels
        #[arg(long, value_name = "PX")]
        at: f64,
        /// Viewport height in pixels
        #[arg(long, value_name = "PX", default_value_t = 600.0)]
        height: f64,
        /// Pane width in columns
        #[arg(long, value_name = "COLS")]
        width: Option<u16>,
    },
    /// Watch the document and rewrite the rendered page on every change
    Watch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PaneArg {
    Source,
    Preview,
}

impl From<PaneArg> for Pane {
    fn from(arg: PaneArg) -> Self {
        match arg {
            PaneArg::Source => Self::Source,
            PaneArg::Preview => Self::Preview,
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file as markdown, wrapping known source files in a code fence.
fn read_document(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(prepare_content(path, content))
}

#[derive(Serialize)]
struct BlockInfo<'a> {
    id: String,
    lines: LineRange,
    extent: LineRange,
    source: &'a str,
}

fn cmd_segment(file: &Path, json: bool) -> Result<()> {
    let text = read_document(file)?;
    let segments = segment(&text);
    let blocks: Vec<_> = segments
        .iter()
        .enumerate()
        .map(|(ordinal, seg)| BlockInfo {
            id: block_id(ordinal, &seg.source, seg.lines.start),
            lines: seg.lines,
            extent: seg.extent,
            source: &seg.source,
        })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }
    for block in &blocks {
        let first = block.source.lines().next().unwrap_or_default();
        println!("{:<24} {:>9} {:>9}  {first}", block.id, block.lines.to_string(), block.extent.to_string());
    }
    Ok(())
}

fn write_page(output: Option<&Path>, file: &Path, store: &BlockStore<HtmlRenderer>) -> Result<()> {
    let title = file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
    let page = standalone_page(&title, &store.assemble_html(), store.renderer().options().background);
    match output {
        Some(path) => fs::write(path, page).with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{page}");
            Ok(())
        }
    }
}

fn cmd_render(file: &Path, output: Option<&Path>, effective: &ConfigFlags) -> Result<()> {
    let text = read_document(file)?;
    let mut store = BlockStore::new(HtmlRenderer::new(effective.render_options()));
    let pass = store.update(&text);
    if pass.failed > 0 {
        eprintln!("[warn] {} block(s) failed to render", pass.failed);
    }
    write_page(output, file, &store)?;
    match output {
        Some(out) if effective.watch => watch_loop(file, out, store, effective),
        _ => Ok(()),
    }
}

#[derive(Serialize)]
struct DiffReport {
    changes: Vec<mdsync::document::BlockChange>,
    summary: DiffSummary,
}

fn cmd_diff(old: &Path, new: &Path, json: bool) -> Result<()> {
    let before = segment(&read_document(old)?);
    let after = segment(&read_document(new)?);
    let changes = diff_blocks(&before, &after);
    let report = DiffReport {
        summary: DiffSummary::of(&changes),
        changes,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for (i, change) in report.changes.iter().enumerate() {
        println!("{i:>4}  {change}");
    }
    let s = report.summary;
    println!("{} kept, {} updated, {} added, {} removed", s.kept, s.updated, s.added, s.removed);
    Ok(())
}

fn cmd_map(file: &Path, from: Pane, at: f64, height: f64, width: u16, effective: &ConfigFlags) -> Result<()> {
    let text = read_document(file)?;
    let width_px = f64::from(width) * COLUMN_PX;
    let mut session = Session::headless(
        HtmlRenderer::new(effective.render_options()),
        width_px,
        width_px,
        height,
        effective.sync_settings(),
    );
    session.set_wrap(!effective.no_wrap);
    session.load(text);

    let controller = session.controller();
    let blocks = session.store().blocks();
    println!("{:>5} {:>9} {:>21} {:>21}", "block", "lines", "source", "preview");
    for pair in controller.table().pairs() {
        let lines = blocks.get(pair.index).map(|b| b.lines.to_string()).unwrap_or_default();
        println!(
            "{:>5} {lines:>9} {:>10.1}-{:<10.1} {:>10.1}-{:<10.1}",
            pair.index,
            pair.source.start_offset,
            pair.source.end_offset,
            pair.preview.start_offset,
            pair.preview.end_offset,
        );
    }

    let to = from.other();
    let (Some(from_state), Some(to_state)) = (controller.scroll_state(from), controller.scroll_state(to)) else {
        anyhow::bail!("views have no layout");
    };
    let at = at.clamp(0.0, from_state.max_scroll());
    let mapped = controller
        .table()
        .map(from, at, from_state.max_scroll(), to_state.max_scroll());
    println!(
        "{from} {at:.1}px (max {:.1}) -> {to} {mapped:.1}px (max {:.1})",
        from_state.max_scroll(),
        to_state.max_scroll()
    );
    Ok(())
}

fn watch_loop(file: &Path, output: &Path, mut store: BlockStore<HtmlRenderer>, effective: &ConfigFlags) -> Result<()> {
    let clock = SystemClock::new();
    let debounce = effective.sync_settings().edit_debounce_ms;
    let mut watcher =
        FileWatcher::new(file, debounce).with_context(|| format!("Failed to watch {}", file.display()))?;
    eprintln!("watching {} -> {}", watcher.target_path().display(), output.display());
    loop {
        if watcher.take_change_ready(clock.now_ms()) {
            match read_document(file) {
                Ok(text) => {
                    let pass = store.update(&text);
                    write_page(Some(output), file, &store)?;
                    let s = pass.summary();
                    eprintln!(
                        "revision {}: {} updated, {} added, {} removed ({} rendered, {} reused, {} failed)",
                        pass.revision, s.updated, s.added, s.removed, pass.rendered, pass.reused, pass.failed
                    );
                }
                Err(err) => eprintln!("[warn] {err:#}"),
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn cmd_watch(file: &Path, output: &Path, effective: &ConfigFlags) -> Result<()> {
    let text = read_document(file)?;
    let mut store = BlockStore::new(HtmlRenderer::new(effective.render_options()));
    store.update(&text);
    write_page(Some(output), file, &store)?;
    watch_loop(file, output, store, effective)
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log = effective
        .render_debug_log
        .clone()
        .or_else(perf::debug_log_path_from_env);
    if let Err(err) = perf::set_debug_log_path(debug_log.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize render debug log {}: {err}",
            debug_log
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
        );
    }

    let Some(command) = cli.command else {
        if cli.save || cli.clear {
            return Ok(());
        }
        anyhow::bail!("no command given; see `mdsync --help`");
    };

    match command {
        Command::Segment { file, json } => cmd_segment(&file, json),
        Command::Render { file, output } => cmd_render(&file, output.as_deref(), &effective),
        Command::Diff { old, new, json } => cmd_diff(&old, &new, json),
        Command::Map {
            file,
            from,
            at,
            height,
            width,
        } => {
            let width = width.or(effective.wrap_width).unwrap_or(80);
            cmd_map(&file, from.into(), at, height, width, &effective)
        }
        Command::Watch { file, output } => cmd_watch(&file, &output, &effective),
    }
}
