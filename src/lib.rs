//! # sheetprep
//!
//! Content-addressed preparation of scanned comic pages. Each distinct scan
//! is turned, exactly once, into a monochrome rendition, a downsized
//! monochrome rendition, and a tree of comic panels. Downstream generators
//! (page templates, EPUB/CBZ packagers, text overlays) read only these cached
//! artifacts.
//!
//! # Pipeline
//!
//! ```text
//! scan ──▶ fingerprint ──▶ cache lookup ──hit──────────────▶ Prepared
//!                               │                               ▲
//!                              miss                             │
//!                               ▼                               │
//!               monochrome ─▶ downsize ─▶ segment ─▶ store ─────┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fingerprint`] | SHA-256 content digest, the only cache key |
//! | [`cache`] | Persistent fingerprint → entry store, staged commits, garbage collection |
//! | [`sheet`] | `SheetVersion`: one scan plus its in-memory preparation state |
//! | [`prepare`] | `ensure` (at most once per sheet) and the parallel sweep |
//! | [`panels`] | Panel tree types, queries, and recursive gutter segmentation |
//! | [`imaging`] | Pure-Rust monochrome, downsize, and the backend trait |
//! | [`scan`] | Discovery of scans below a project root |
//! | [`config`] | `config.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Addressing
//!
//! Artifacts are keyed by the digest of the scan's bytes, never by path or
//! modification time. Renaming a scan, checking it out again, or copying it
//! to another chapter costs one hash and no image work. Each entry also
//! records a hash of the settings it was made with; changing a threshold or
//! a ratio re-prepares the affected sheets.
//!
//! ## Per-Sheet Locking
//!
//! Each sheet carries its own lock and `done` flag. Preparing one sheet never
//! blocks another; concurrent requests for the same sheet wait for the first
//! and then reuse its result. The cache index has its own short-held lock.
//!
//! ## Staged Commits
//!
//! Artifacts are written to a private staging directory and renamed into
//! place. A crash mid-conversion leaves a staging directory for the next
//! garbage collection, never a half-written entry.

pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod imaging;
pub mod output;
pub mod panels;
pub mod prepare;
pub mod scan;
pub mod sheet;

pub use cache::{ArtifactCache, ArtifactPaths, CacheEntry};
pub use fingerprint::Fingerprint;
pub use panels::{PanelNode, Rect};
pub use prepare::{CancelFlag, PrepError, PrepStats, Preparer};
pub use sheet::{Prepared, SheetVersion};

#[cfg(test)]
pub(crate) mod test_helpers;
