//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every line leads with the sheet's logical name or the panel's reading
//! position; paths and cache status are secondary, indented context.
//!
//! # Output Format
//!
//! ## Prepare
//!
//! ```text
//! ch1/001 (4 panels)
//!     prepared
//! ch1/002 (3 panels)
//!     cached
//! ch1/003
//!     failed (invalid content): Not a readable raster image: ...
//!
//! 1/3 sheets needed work, 1 failed
//! ```
//!
//! ## Panels
//!
//! ```text
//! rows [0,0,800,1000]
//!     001 [0,20,800,480]
//!     cols [0,520,800,980]
//!         002 [0,520,380,980]
//!         003 [420,520,800,980]
//! 3 panels
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::cache::GcStats;
use crate::panels::{Axis, PanelNode, Rect};
use crate::prepare::{PrepEvent, PrepStats};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_rect(rect: &Rect) -> String {
    format!(
        "[{},{},{},{}]",
        rect.min_x, rect.min_y, rect.max_x, rect.max_y
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Prepare
// ============================================================================

/// Format a single sweep progress event as display lines.
pub fn format_prep_event(event: &PrepEvent) -> Vec<String> {
    match event {
        PrepEvent::Prepared {
            name,
            did_work,
            panels,
        } => vec![
            format!("{} ({})", name, plural(*panels, "panel")),
            format!(
                "{}{}",
                indent(1),
                if *did_work { "prepared" } else { "cached" }
            ),
        ],
        PrepEvent::Failed { name, kind, error } => vec![
            name.clone(),
            format!("{}failed ({}): {}", indent(1), kind, error),
        ],
        PrepEvent::Cancelled { name } => vec![name.clone(), format!("{}cancelled", indent(1))],
    }
}

/// Blank separator line, then the sweep statistics.
pub fn format_prep_summary(stats: &PrepStats) -> Vec<String> {
    if stats.total == 0 {
        return vec!["No sheets found".to_string()];
    }
    vec![String::new(), stats.to_string()]
}

pub fn print_prep_summary(stats: &PrepStats) {
    for line in format_prep_summary(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Panels
// ============================================================================

/// Format a panel tree, one node per line, leaves numbered in reading order.
pub fn format_panel_tree(tree: &PanelNode) -> Vec<String> {
    let mut lines = Vec::new();
    let mut next_panel = 1;
    walk_panel_tree(tree, 0, &mut next_panel, &mut lines);
    lines.push(plural(tree.panel_count(), "panel"));
    lines
}

fn walk_panel_tree(node: &PanelNode, depth: usize, next: &mut usize, lines: &mut Vec<String>) {
    match node.split() {
        Some((axis, children)) => {
            let label = match axis {
                Axis::Rows => "rows",
                Axis::Cols => "cols",
            };
            lines.push(format!("{}{} {}", indent(depth), label, format_rect(&node.rect)));
            for child in children {
                walk_panel_tree(child, depth + 1, next, lines);
            }
        }
        None => {
            lines.push(format!(
                "{}{} {}",
                indent(depth),
                format_index(*next),
                format_rect(&node.rect)
            ));
            *next += 1;
        }
    }
}

pub fn print_panel_tree(tree: &PanelNode) {
    for line in format_panel_tree(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Garbage collection
// ============================================================================

pub fn format_gc_stats(stats: &GcStats) -> Vec<String> {
    let mut lines = vec![format!("Cache: {}", stats)];
    if !stats.is_empty() {
        lines.push(format!("{}sources dropped: {}", indent(1), stats.stale_sources));
        lines.push(format!("{}entries dropped: {}", indent(1), stats.orphan_entries));
        lines.push(format!("{}directories removed: {}", indent(1), stats.removed_dirs));
    }
    lines
}

pub fn print_gc_stats(stats: &GcStats) {
    for line in format_gc_stats(stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
