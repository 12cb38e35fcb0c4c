//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders), format sniffed from content |
//! | Monochrome | `DynamicImage::to_rgb8` + channel mean + threshold |
//! | Downsize | `image::imageops::resize` with `Triangle` (bilinear) filter |
//! | Encode → PNG | `image::ImageFormat::Png` |
//! | Segment | [`detect_panels`](crate::panels::detect_panels) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{binarize, downsized_dimensions, gray_level};
use super::params::{DownsizeParams, MonochromeParams, PanelParams, Threshold};
use crate::panels::{PanelNode, detect_panels};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions a scan may carry, paired with the decoder that reads them.
const SCAN_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    SCAN_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of scan file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
///
/// A missing or unreadable file is an I/O error; bytes that are not a
/// supported raster image are a decode error.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))
}

fn save_png(img: &GrayImage, path: &Path) -> Result<(), BackendError> {
    img.save_with_format(path, ImageFormat::Png).map_err(|e| {
        BackendError::ProcessingFailed(format!("PNG encode failed for {}: {}", path.display(), e))
    })
}

/// Reduce to gray by channel mean, then binarize.
pub fn to_monochrome(img: &DynamicImage, threshold: Threshold) -> GrayImage {
    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([binarize(gray_level(r, g, b), threshold.value())])
    })
}

/// Bilinear copy no wider than `max_width`; narrower images are copied as-is.
pub fn downsize(img: &GrayImage, max_width: u32) -> GrayImage {
    match downsized_dimensions(img.dimensions(), max_width) {
        Some((w, h)) => image::imageops::resize(img, w, h, FilterType::Triangle),
        None => img.clone(),
    }
}

fn dimensions_of(img: &GrayImage) -> Dimensions {
    Dimensions {
        width: img.width(),
        height: img.height(),
    }
}

impl ImageBackend for RustBackend {
    fn monochrome(&self, params: &MonochromeParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let mono = to_monochrome(&img, params.threshold);
        save_png(&mono, &params.output)?;
        Ok(dimensions_of(&mono))
    }

    fn downsize(&self, params: &DownsizeParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?.into_luma8();
        let small = downsize(&img, params.max_width);
        save_png(&small, &params.output)?;
        Ok(dimensions_of(&small))
    }

    fn segment(&self, params: &PanelParams) -> Result<PanelNode, BackendError> {
        let img = load_image(&params.source)?.into_luma8();
        Ok(detect_panels(&img, &params.segment)?)
    }
}
