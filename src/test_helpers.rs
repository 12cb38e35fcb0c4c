//! Shared test utilities: synthetic scan pages.
//!
//! Pages are drawn as 8-bit gray images on a white background, the way a
//! monochrome rendition of a hand-drawn page looks after thresholding.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut page = white_page(800, 1000);
//! outline_rect(&mut page, Rect::new(20, 20, 780, 480), 3);
//! outline_rect(&mut page, Rect::new(20, 520, 780, 980), 3);
//! write_png(&page, &tmp.path().join("001.png"));
//! ```

use image::{GrayImage, Luma};
use std::path::Path;

use crate::panels::Rect;

// =========================================================================
// Drawing
// =========================================================================

pub fn white_page(width: u32, height: u32) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([255]))
}

/// Fill `rect` with a single gray value.
pub fn fill_rect(img: &mut GrayImage, rect: Rect, value: u8) {
    for y in rect.min_y..rect.max_y {
        for x in rect.min_x..rect.max_x {
            img.put_pixel(x, y, Luma([value]));
        }
    }
}

/// Draw a black frame of `thickness` pixels just inside `rect`.
pub fn outline_rect(img: &mut GrayImage, rect: Rect, thickness: u32) {
    let t = thickness;
    let Rect {
        min_x,
        min_y,
        max_x,
        max_y,
    } = rect;
    fill_rect(img, Rect::new(min_x, min_y, max_x, min_y + t), 0);
    fill_rect(img, Rect::new(min_x, max_y - t, max_x, max_y), 0);
    fill_rect(img, Rect::new(min_x, min_y, min_x + t, max_y), 0);
    fill_rect(img, Rect::new(max_x - t, min_y, max_x, max_y), 0);
}

/// A page with `rows` stacked outlined panels separated by 40px white gutters.
pub fn stacked_page(width: u32, height: u32, rows: u32) -> GrayImage {
    let mut img = white_page(width, height);
    let gap = 40;
    let band = (height - gap) / rows;
    for i in 0..rows {
        let top = gap / 2 + i * band + gap / 2;
        let bottom = gap / 2 + (i + 1) * band - gap / 2;
        outline_rect(&mut img, Rect::new(20, top, width - 20, bottom), 3);
    }
    img
}

// =========================================================================
// Files
// =========================================================================

/// Encode as PNG, creating parent directories.
pub fn write_png(img: &GrayImage, path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    img.save(path).unwrap();
}

/// Write a 400x500 scan with `rows` panels, returning its path. `mark`
/// places a dot inside the first panel so distinct marks give distinct bytes
/// without changing the panel layout.
pub fn write_scan(dir: &Path, name: &str, rows: u32, mark: u32) -> std::path::PathBuf {
    let mut img = stacked_page(400, 500, rows);
    img.put_pixel(30 + mark % 300, 50 + (mark / 300) % 20, Luma([0]));
    let path = dir.join(format!("{name}.png"));
    write_png(&img, &path);
    path
}
