//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides which
//! artifacts a sheet needs) and the [`backend`](super::backend) (which does
//! the pixel work), so tests can swap in a mock backend.
//!
//! ## Types
//!
//! - [`Threshold`]: Gray level below which a pixel becomes black (default 128).
//! - [`MonochromeParams`]: Source scan, output path, threshold.
//! - [`DownsizeParams`]: Monochrome input, output path, maximum width.
//! - [`PanelParams`]: Monochrome input and segmentation thresholds.

use crate::panels::SegmentParams;
use std::path::PathBuf;

/// Binarization threshold: gray levels strictly below it become black.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold(pub u8);

impl Threshold {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(128)
    }
}

/// Convert a scan to a black-and-white PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct MonochromeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub threshold: Threshold,
}

/// Write a copy of `source` no wider than `max_width`.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: u32,
}

/// Segment a monochrome image into panels.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelParams {
    pub source: PathBuf,
    pub segment: SegmentParams,
}
