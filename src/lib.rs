// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. sync::SyncController)
    clippy::module_name_repetitions
)]

//! # mdsync
//!
//! Incremental markdown rendering with synchronized source/preview scrolling.
//!
//! A document is split into top-level blocks, and only blocks whose text
//! changed are re-rendered. Both views are measured block by block, and a
//! scroll in either view is mapped onto the other through those
//! measurements.
//!
//! ## Modules
//!
//! - [`document`]: Segmentation, diffing and the incremental block store
//! - [`render`]: Block-to-HTML conversion
//! - [`highlight`]: Syntax highlighting for fenced code
//! - [`viewport`]: The view abstraction, geometry tracking and headless layouts
//! - [`sync`]: Scroll mapping and the sync state machine
//! - [`session`]: Wiring a document to both views
//! - [`config`]: Persistent default flags
//! - [`watcher`]: File watching

pub mod config;
pub mod document;
pub mod highlight;
pub mod perf;
pub mod render;
pub mod session;
pub mod sync;
pub mod viewport;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::document::{Block, BlockChange, BlockStore, LineRange, RenderPass};
    pub use crate::render::{BlockRenderer, HtmlRenderer, RenderOptions};
    pub use crate::session::Session;
    pub use crate::sync::{Clock, FrameScheduler, MappingTable, SyncController, SyncSettings, SyncState};
    pub use crate::viewport::{Pane, ScrollState, Section, Viewport};
}
