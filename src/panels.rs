//! Panel segmentation: decompose a monochrome page into a tree of panels.
//!
//! A page is split recursively along separator bands. A *separator line* is
//! a row (or column) whose pixels inside the current region are all one
//! colour: pure white gutters or pure black gutters. Consecutive separator
//! lines form a band; the content between bands forms candidate regions.
//!
//! ```text
//! ┌────────────────────┐
//! │ ┌──────┐ ┌───────┐ │   rows: [ cols: [leaf, leaf],
//! │ │      │ │       │ │           leaf ]
//! │ └──────┘ └───────┘ │
//! │                    │ ← separator band
//! │ ┌────────────────┐ │
//! │ └────────────────┘ │
//! └────────────────────┘
//! ```
//!
//! ## Algorithm
//!
//! For a region (initially the whole page):
//!
//! 1. Classify every row inside the region and collect separator bands.
//! 2. Keep the runs between bands that are longer than `min_size`.
//!    A band longer than `2 × min_size` whose interior, inset by `border`
//!    along the split axis, is entirely black is itself a panel (a full-bleed
//!    black panel rather than a gutter).
//! 3. Two or more regions make a row node; recurse into each.
//! 4. Otherwise repeat on columns. Two or more make a column node.
//! 5. Otherwise the region is a leaf.
//!
//! Nodes with exactly one child are collapsed into that child, bottom-up.
//! `min_size` and `border` are ratios of the page height so the result does
//! not depend on scan resolution; see [`SegmentParams`].
//!
//! The finished tree is checked by [`PanelNode::validate`]. A violation means
//! the segmenter itself is broken and is reported as
//! [`SegmentError::Inconsistent`].

use image::GrayImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Image has no pixels ({0}x{1})")]
    EmptyImage(u32, u32),
    #[error("Inconsistent panel tree: {0}")]
    Inconsistent(String),
}

/// Half-open pixel rectangle, serialized as `[minX, minY, maxX, maxY]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Rect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Rect {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        (r.min_x < r.max_x && r.min_y < r.max_y).then_some(r)
    }
}

impl From<[u32; 4]> for Rect {
    fn from([min_x, min_y, max_x, max_y]: [u32; 4]) -> Self {
        Rect::new(min_x, min_y, max_x, max_y)
    }
}

impl From<Rect> for [u32; 4] {
    fn from(r: Rect) -> Self {
        [r.min_x, r.min_y, r.max_x, r.max_y]
    }
}

/// Split direction of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Cols,
}

impl Axis {
    /// Extent of `area` along the scan direction.
    fn span(self, area: Rect) -> (u32, u32) {
        match self {
            Axis::Rows => (area.min_y, area.max_y),
            Axis::Cols => (area.min_x, area.max_x),
        }
    }

    /// Sub-rectangle of `area` between `from` and `to` along this axis.
    fn slice(self, area: Rect, from: u32, to: u32) -> Rect {
        match self {
            Axis::Rows => Rect::new(area.min_x, from, area.max_x, to),
            Axis::Cols => Rect::new(from, area.min_y, to, area.max_y),
        }
    }
}

/// One node of the panel tree. Leaves are panels; internal nodes hold
/// either `rows` or `cols`, never both, and never exactly one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelNode {
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<PanelNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cols: Vec<PanelNode>,
}

impl PanelNode {
    pub fn leaf(rect: Rect) -> Self {
        Self {
            rect,
            rows: Vec::new(),
            cols: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.rows.is_empty() && self.cols.is_empty()
    }

    /// Split axis and children, or `None` for a leaf.
    pub fn split(&self) -> Option<(Axis, &[PanelNode])> {
        if !self.rows.is_empty() {
            Some((Axis::Rows, &self.rows))
        } else if !self.cols.is_empty() {
            Some((Axis::Cols, &self.cols))
        } else {
            None
        }
    }

    /// Collapse every one-child node into its child, bottom-up.
    pub fn flattened(mut self) -> Self {
        self.rows = self.rows.into_iter().map(PanelNode::flattened).collect();
        self.cols = self.cols.into_iter().map(PanelNode::flattened).collect();
        if self.rows.len() == 1 && self.cols.is_empty() {
            return self.rows.remove(0);
        }
        if self.cols.len() == 1 && self.rows.is_empty() {
            return self.cols.remove(0);
        }
        self
    }

    /// Check the structural invariants of the tree rooted here.
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.rect.min_x > self.rect.max_x || self.rect.min_y > self.rect.max_y {
            return Err(SegmentError::Inconsistent(format!(
                "malformed rect {:?}",
                <[u32; 4]>::from(self.rect)
            )));
        }
        if !self.rows.is_empty() && !self.cols.is_empty() {
            return Err(SegmentError::Inconsistent(format!(
                "node {:?} has both rows and cols",
                <[u32; 4]>::from(self.rect)
            )));
        }
        let children = self.split().map(|(_, c)| c).unwrap_or_default();
        if children.len() == 1 {
            return Err(SegmentError::Inconsistent(format!(
                "node {:?} has a single child",
                <[u32; 4]>::from(self.rect)
            )));
        }
        for child in children {
            if !self.rect.contains(&child.rect) {
                return Err(SegmentError::Inconsistent(format!(
                    "child {:?} lies outside parent {:?}",
                    <[u32; 4]>::from(child.rect),
                    <[u32; 4]>::from(self.rect)
                )));
            }
            child.validate()?;
        }
        Ok(())
    }

    /// Leaf panels in reading order: rows top to bottom, columns left to right.
    pub fn leaves(&self) -> Vec<&PanelNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a PanelNode>) {
        match self.split() {
            Some((_, children)) => children.iter().for_each(|c| c.collect_leaves(out)),
            None => out.push(self),
        }
    }

    pub fn panel_count(&self) -> usize {
        match self.split() {
            Some((_, children)) => children.iter().map(PanelNode::panel_count).sum(),
            None => 1,
        }
    }

    /// The `idx`-th panel in reading order.
    pub fn panel(&self, idx: usize) -> Option<&PanelNode> {
        self.leaves().into_iter().nth(idx)
    }

    /// Index and node of the panel containing the pixel `(x, y)`.
    pub fn panel_at(&self, x: u32, y: u32) -> Option<(usize, &PanelNode)> {
        self.leaves()
            .into_iter()
            .enumerate()
            .find(|(_, p)| p.rect.contains_point(x, y))
    }

    /// Index of the panel sharing the largest area with `area`, if any overlaps.
    pub fn panel_most_covered_by(&self, area: &Rect) -> Option<usize> {
        self.leaves()
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| p.rect.intersection(area).map(|r| (i, r.area())))
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(i, _)| i)
    }

    /// Bounding box of all panels. Tighter than `rect` when the page has
    /// margins that segmentation split off.
    pub fn px_bounds(&self) -> Rect {
        self.leaves()
            .into_iter()
            .map(|p| p.rect)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(self.rect)
    }
}

/// Tunable segmentation thresholds, as fractions of the page height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentParams {
    /// Regions no longer than this are discarded (gutter noise, margins).
    pub min_size_ratio: f64,
    /// Inset applied to a wide band before checking it for solid black.
    pub border_ratio: f64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            min_size_ratio: 1.0 / 11.0,
            border_ratio: 4.0 / 210.0,
        }
    }
}

/// Segment a monochrome page into its panel tree.
pub fn detect_panels(img: &GrayImage, params: &SegmentParams) -> Result<PanelNode, SegmentError> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(SegmentError::EmptyImage(w, h));
    }
    let segmenter = Segmenter {
        img,
        min_size: ((h as f64 * params.min_size_ratio) as u32).max(1),
        border: (h as f64 * params.border_ratio) as u32,
    };
    let root = segmenter.node(Rect::new(0, 0, w, h)).flattened();
    root.validate()?;
    Ok(root)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Line {
    Blank,
    Solid,
    Content,
}

struct Segmenter<'a> {
    img: &'a GrayImage,
    min_size: u32,
    border: u32,
}

impl Segmenter<'_> {
    fn node(&self, area: Rect) -> PanelNode {
        let mut node = PanelNode::leaf(area);
        let rows = self.regions(area, Axis::Rows);
        if rows.len() >= 2 {
            node.rows = rows.into_iter().map(|r| self.node(r)).collect();
        } else {
            let cols = self.regions(area, Axis::Cols);
            if cols.len() >= 2 {
                node.cols = cols.into_iter().map(|c| self.node(c)).collect();
            }
        }
        node.flattened()
    }

    fn pixel(&self, x: u32, y: u32) -> u8 {
        self.img.get_pixel(x, y).0[0]
    }

    /// Classify the line at `pos` across `area`.
    fn line(&self, area: Rect, axis: Axis, pos: u32) -> Line {
        match axis {
            Axis::Rows => classify((area.min_x..area.max_x).map(|x| self.pixel(x, pos))),
            Axis::Cols => classify((area.min_y..area.max_y).map(|y| self.pixel(pos, y))),
        }
    }

    /// Maximal runs of separator lines as `[start, end)` positions.
    fn bands(&self, area: Rect, axis: Axis) -> Vec<(u32, u32)> {
        let (start, end) = axis.span(area);
        let mut bands = Vec::new();
        let mut open: Option<u32> = None;
        for pos in start..end {
            let sep = self.line(area, axis, pos) != Line::Content;
            match (sep, open) {
                (true, None) => open = Some(pos),
                (false, Some(from)) => {
                    bands.push((from, pos));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(from) = open {
            bands.push((from, end));
        }
        bands
    }

    fn regions(&self, area: Rect, axis: Axis) -> Vec<Rect> {
        let (start, end) = axis.span(area);
        let mut regions = Vec::new();
        let mut prev = start;
        for (from, to) in self.bands(area, axis) {
            if from - prev > self.min_size {
                regions.push(axis.slice(area, prev, from));
            }
            prev = to;
            let (inner_from, inner_to) = (from + self.border, to.saturating_sub(self.border));
            if to - from > 2 * self.min_size && inner_from < inner_to {
                let inner = axis.slice(area, inner_from, inner_to);
                if self.is_solid(inner) {
                    regions.push(inner);
                }
            }
        }
        if end - prev > self.min_size {
            regions.push(axis.slice(area, prev, end));
        }
        regions
    }

    fn is_solid(&self, r: Rect) -> bool {
        (r.min_y..r.max_y).all(|y| (r.min_x..r.max_x).all(|x| self.pixel(x, y) == BLACK))
    }
}

fn classify(mut pixels: impl Iterator<Item = u8>) -> Line {
    let Some(first) = pixels.next() else {
        return Line::Blank;
    };
    let kind = match first {
        WHITE => Line::Blank,
        BLACK => Line::Solid,
        _ => return Line::Content,
    };
    if pixels.all(|p| p == first) {
        kind
    } else {
        Line::Content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fill_rect, outline_rect, white_page};

    fn leaf(r: [u32; 4]) -> PanelNode {
        PanelNode::leaf(r.into())
    }

    fn detect(img: &GrayImage) -> PanelNode {
        detect_panels(img, &SegmentParams::default()).unwrap()
    }

    // =========================================================================
    // Segmentation
    // =========================================================================

    #[test]
    fn blank_page_is_single_leaf() {
        let img = white_page(800, 1000);
        let tree = detect(&img);
        assert_eq!(tree, leaf([0, 0, 800, 1000]));
    }

    #[test]
    fn single_outlined_rect_is_single_leaf() {
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(100, 100, 700, 900), 3);
        let tree = detect(&img);
        assert!(tree.is_leaf());
        assert_eq!(tree.rect, Rect::new(0, 0, 800, 1000));
        assert_eq!(tree.panel_count(), 1);
    }

    #[test]
    fn white_band_splits_two_rows() {
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 480), 3);
        outline_rect(&mut img, Rect::new(20, 520, 780, 980), 3);

        let tree = detect(&img);
        assert!(tree.cols.is_empty());
        assert_eq!(tree.rows.len(), 2);
        assert_eq!(tree.rows[0], leaf([0, 20, 800, 480]));
        assert_eq!(tree.rows[1], leaf([0, 520, 800, 980]));
        // neither child covers the 40px gap
        for row in &tree.rows {
            assert!(row.rect.intersection(&Rect::new(0, 480, 800, 520)).is_none());
        }
    }

    #[test]
    fn two_by_two_grid_is_rows_of_cols() {
        let mut img = white_page(800, 1000);
        for r in [
            Rect::new(40, 40, 380, 480),
            Rect::new(420, 40, 760, 480),
            Rect::new(40, 520, 380, 960),
            Rect::new(420, 520, 760, 960),
        ] {
            outline_rect(&mut img, r, 2);
        }

        let tree = detect(&img);
        assert_eq!(tree.rows.len(), 2);
        assert_eq!(
            tree.rows[0].cols,
            vec![leaf([40, 40, 380, 480]), leaf([420, 40, 760, 480])]
        );
        assert_eq!(
            tree.rows[1].cols,
            vec![leaf([40, 520, 380, 960]), leaf([420, 520, 760, 960])]
        );
        assert_eq!(tree.panel_count(), 4);
    }

    #[test]
    fn small_regions_are_discarded_and_tree_collapses() {
        // A 30px strip of scribble is below the minimum size (1000 / 11 ≈ 90),
        // leaving only one real row region, which must not become a one-child node.
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 50), 1);
        outline_rect(&mut img, Rect::new(20, 100, 780, 980), 3);

        let tree = detect(&img);
        assert!(tree.is_leaf());
        assert_eq!(tree.rect, Rect::new(0, 0, 800, 1000));
    }

    #[test]
    fn wide_black_band_becomes_its_own_panel() {
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 300), 3);
        fill_rect(&mut img, Rect::new(0, 310, 800, 690), BLACK);
        outline_rect(&mut img, Rect::new(20, 700, 780, 980), 3);

        // border = 1000 * 4 / 210 = 19
        let tree = detect(&img);
        assert_eq!(tree.rows.len(), 3);
        assert_eq!(tree.rows[0].rect, Rect::new(0, 20, 800, 300));
        assert_eq!(tree.rows[1].rect, Rect::new(0, 319, 800, 681));
        assert!(tree.rows[1].is_leaf());
        assert_eq!(tree.rows[2].rect, Rect::new(0, 700, 800, 980));
    }

    #[test]
    fn narrow_black_gutter_is_only_a_separator() {
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 450), 3);
        fill_rect(&mut img, Rect::new(0, 460, 800, 540), BLACK);
        outline_rect(&mut img, Rect::new(20, 550, 780, 980), 3);

        let tree = detect(&img);
        assert_eq!(
            tree.rows,
            vec![leaf([0, 20, 800, 450]), leaf([0, 550, 800, 980])]
        );
    }

    #[test]
    fn gray_pixels_count_as_content() {
        let mut img = white_page(200, 200);
        fill_rect(&mut img, Rect::new(0, 90, 200, 110), 128);
        // the gray strip is content, not a separator: no split
        assert!(detect(&img).is_leaf());
    }

    #[test]
    fn empty_image_is_rejected() {
        let img = GrayImage::new(0, 0);
        assert_eq!(
            detect_panels(&img, &SegmentParams::default()),
            Err(SegmentError::EmptyImage(0, 0))
        );
    }

    #[test]
    fn thresholds_scale_with_params() {
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 480), 3);
        outline_rect(&mut img, Rect::new(20, 520, 780, 980), 3);
        // min size of 60% of the page height rejects both halves
        let strict = SegmentParams {
            min_size_ratio: 0.6,
            ..SegmentParams::default()
        };
        assert!(detect_panels(&img, &strict).unwrap().is_leaf());
    }

    #[test]
    fn region_of_exactly_min_size_is_discarded() {
        // min size = 1000 * 0.1 = 100
        let params = SegmentParams {
            min_size_ratio: 0.1,
            ..SegmentParams::default()
        };
        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 120), 3);
        outline_rect(&mut img, Rect::new(20, 200, 780, 980), 3);
        assert!(detect_panels(&img, &params).unwrap().is_leaf());

        let mut img = white_page(800, 1000);
        outline_rect(&mut img, Rect::new(20, 20, 780, 121), 3);
        outline_rect(&mut img, Rect::new(20, 200, 780, 980), 3);
        let tree = detect_panels(&img, &params).unwrap();
        assert_eq!(tree.rows.len(), 2);
        assert_eq!(tree.rows[0].rect, Rect::new(0, 20, 800, 121));
    }

    // =========================================================================
    // Tree invariants
    // =========================================================================

    #[test]
    fn flatten_collapses_nested_single_children() {
        let inner = PanelNode {
            rect: Rect::new(0, 0, 10, 10),
            rows: vec![],
            cols: vec![leaf([0, 0, 5, 10]), leaf([5, 0, 10, 10])],
        };
        let wrapped = PanelNode {
            rect: Rect::new(0, 0, 10, 10),
            rows: vec![PanelNode {
                rect: Rect::new(0, 0, 10, 10),
                rows: vec![],
                cols: vec![inner.clone()],
            }],
            cols: vec![],
        };
        assert_eq!(wrapped.flattened(), inner);
    }

    #[test]
    fn validate_rejects_rows_and_cols_together() {
        let node = PanelNode {
            rect: Rect::new(0, 0, 10, 10),
            rows: vec![leaf([0, 0, 10, 5]), leaf([0, 5, 10, 10])],
            cols: vec![leaf([0, 0, 5, 10]), leaf([5, 0, 10, 10])],
        };
        assert!(matches!(node.validate(), Err(SegmentError::Inconsistent(_))));
    }

    #[test]
    fn validate_rejects_single_child() {
        let node = PanelNode {
            rect: Rect::new(0, 0, 10, 10),
            rows: vec![leaf([0, 0, 10, 10])],
            cols: vec![],
        };
        assert!(node.validate().is_err());
    }

    #[test]
    fn validate_rejects_child_outside_parent() {
        let node = PanelNode {
            rect: Rect::new(0, 0, 10, 10),
            rows: vec![leaf([0, 0, 10, 5]), leaf([0, 5, 10, 12])],
            cols: vec![],
        };
        let err = node.validate().unwrap_err();
        assert!(err.to_string().contains("outside parent"));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn grid() -> PanelNode {
        PanelNode {
            rect: Rect::new(0, 0, 100, 100),
            rows: vec![
                PanelNode {
                    rect: Rect::new(0, 10, 100, 45),
                    rows: vec![],
                    cols: vec![leaf([10, 10, 45, 45]), leaf([55, 10, 90, 45])],
                },
                leaf([0, 55, 100, 90]),
            ],
            cols: vec![],
        }
    }

    #[test]
    fn leaves_follow_reading_order() {
        let tree = grid();
        let rects: Vec<[u32; 4]> = tree.leaves().iter().map(|p| p.rect.into()).collect();
        assert_eq!(
            rects,
            vec![[10, 10, 45, 45], [55, 10, 90, 45], [0, 55, 100, 90]]
        );
        assert_eq!(tree.panel_count(), 3);
        assert_eq!(tree.panel(1).unwrap().rect, Rect::new(55, 10, 90, 45));
        assert!(tree.panel(3).is_none());
    }

    #[test]
    fn panel_at_finds_containing_leaf() {
        let tree = grid();
        assert_eq!(tree.panel_at(60, 20).map(|(i, _)| i), Some(1));
        assert_eq!(tree.panel_at(50, 60).map(|(i, _)| i), Some(2));
        // gutter between the two top panels
        assert!(tree.panel_at(50, 20).is_none());
    }

    #[test]
    fn panel_most_covered_by_picks_largest_overlap() {
        let tree = grid();
        assert_eq!(tree.panel_most_covered_by(&Rect::new(40, 20, 80, 30)), Some(1));
        assert_eq!(tree.panel_most_covered_by(&Rect::new(0, 40, 100, 100)), Some(2));
        assert_eq!(tree.panel_most_covered_by(&Rect::new(0, 0, 5, 5)), None);
    }

    #[test]
    fn px_bounds_is_union_of_leaves() {
        assert_eq!(grid().px_bounds(), Rect::new(0, 10, 100, 90));
        assert_eq!(leaf([1, 2, 3, 4]).px_bounds(), Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn serializes_rect_as_array_and_omits_empty_children() {
        let json = serde_json::to_value(grid()).unwrap();
        assert_eq!(json["rect"], serde_json::json!([0, 0, 100, 100]));
        assert!(json.get("cols").is_none());
        assert_eq!(json["rows"][1], serde_json::json!({ "rect": [0, 55, 100, 90] }));

        let back: PanelNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, grid());
    }
}
