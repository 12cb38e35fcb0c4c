//! Pure pixel and dimension math.
//!
//! All functions here are pure and testable without any I/O or images.

/// Gray level of an RGB pixel: the plain mean of the three channels.
///
/// Gray input (r = g = b) maps to itself exactly.
pub fn gray_level(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

/// Black (0) below `threshold`, white (255) otherwise.
pub fn binarize(gray: u8, threshold: u8) -> u8 {
    if gray < threshold { 0 } else { 255 }
}

/// Target dimensions for a downsized copy, or `None` if the image already
/// fits within `max_width`.
///
/// Height scales proportionally and never drops below one pixel.
///
/// # Examples
/// ```
/// # use sheetprep::imaging::downsized_dimensions;
/// assert_eq!(downsized_dimensions((2560, 3600), 1280), Some((1280, 1800)));
/// assert_eq!(downsized_dimensions((1000, 1400), 1280), None);
/// ```
pub fn downsized_dimensions(original: (u32, u32), max_width: u32) -> Option<(u32, u32)> {
    let (w, h) = original;
    if w <= max_width || max_width == 0 {
        return None;
    }
    let scaled_h = (h as f64 * max_width as f64 / w as f64).round() as u32;
    Some((max_width, scaled_h.max(1)))
}
