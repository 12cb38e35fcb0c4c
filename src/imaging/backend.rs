//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations a sheet needs:
//! monochrome conversion, downsizing, and panel segmentation.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked. Tests use the recording [`MockBackend`](tests::MockBackend).

use super::params::{DownsizeParams, MonochromeParams, PanelParams};
use crate::panels::{PanelNode, SegmentError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a readable raster image: {0}")]
    Decode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Segmentation failed: {0}")]
    Segment(#[from] SegmentError),
}

/// Pixel dimensions of a written image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can serve a whole rayon sweep.
pub trait ImageBackend: Sync {
    /// Write a black-and-white rendition of the source.
    fn monochrome(&self, params: &MonochromeParams) -> Result<Dimensions, BackendError>;

    /// Write a copy no wider than `max_width`.
    fn downsize(&self, params: &DownsizeParams) -> Result<Dimensions, BackendError>;

    /// Build the panel tree of a monochrome image.
    fn segment(&self, params: &PanelParams) -> Result<PanelNode, BackendError>;
}
