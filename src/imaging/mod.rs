//! Image processing in pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Monochrome** | channel mean + threshold over `image::RgbImage` |
//! | **Downsize** | `image::imageops::resize` (bilinear) |
//! | **Segment** | [`crate::panels::detect_panels`] on the monochrome PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for pixel and dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining parameters + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{binarize, downsized_dimensions, gray_level};
pub use operations::{ArtifactConfig, PreparedArtifacts, prepare_artifacts};
pub use params::{DownsizeParams, MonochromeParams, PanelParams, Threshold};
pub use rust_backend::{RustBackend, downsize, supported_input_extensions, to_monochrome};
