//! Composite validation utilities for test pattern verification.
//!
//! This module provides functions to validate that quadrants of an RGBA
//! composite contain expected test patterns. Useful for integration testing
//! with virtual cameras.

use crate::convert::RGBA_BYTES_PER_PIXEL;
use crate::layout::Rect;
use crate::traits::{CameraError, Result};

/// Expected RGB values for color bars (8 bars) after studio-range
/// expansion.
///
/// Colors in order: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
const COLOR_BARS: [(u8, u8, u8); 8] = [
    (255, 255, 255), // White
    (255, 255, 0),   // Yellow
    (0, 255, 255),   // Cyan
    (0, 255, 0),     // Green
    (255, 0, 255),   // Magenta
    (255, 0, 0),     // Red
    (0, 0, 255),     // Blue
    (0, 0, 0),       // Black
];

/// Tolerance for RGB color matching (accounts for capture and rounding error).
const COLOR_TOLERANCE: u8 = 20;

/// RGBA value of the pixel at `(x, y)` in an image with `stride` bytes per row.
pub fn pixel_at(data: &[u8], stride: usize, x: u32, y: u32) -> Option<[u8; 4]> {
    let offset = y as usize * stride + x as usize * RGBA_BYTES_PER_PIXEL;
    let bytes = data.get(offset..offset + RGBA_BYTES_PER_PIXEL)?;
    let mut pixel = [0u8; 4];
    pixel.copy_from_slice(bytes);
    Some(pixel)
}

fn pixel_in(data: &[u8], stride: usize, rect: &Rect, x: u32, y: u32) -> Result<[u8; 4]> {
    let (abs_x, abs_y) = (rect.x + x, rect.y + y);
    pixel_at(data, stride, abs_x, abs_y).ok_or_else(|| {
        CameraError::StreamError(format!("Failed to get pixel at ({abs_x}, {abs_y})"))
    })
}

/// Validates that every pixel in `rect` is identical and returns it.
///
/// A quadrant that is part-way through being rewritten with a different
/// solid color fails this check.
pub fn validate_uniform(data: &[u8], stride: usize, rect: &Rect) -> Result<[u8; 4]> {
    let first = pixel_in(data, stride, rect, 0, 0)?;
    for y in 0..rect.height {
        for x in 0..rect.width {
            let pixel = pixel_in(data, stride, rect, x, y)?;
            if pixel != first {
                return Err(CameraError::StreamError(format!(
                    "Non-uniform pixel at ({}, {}): expected {first:?}, got {pixel:?}",
                    rect.x + x,
                    rect.y + y
                )));
            }
        }
    }
    Ok(first)
}

/// Validates that every pixel in `rect` matches `expected` RGB within
/// `tolerance` and is fully opaque.
pub fn validate_solid(
    data: &[u8],
    stride: usize,
    rect: &Rect,
    expected: [u8; 3],
    tolerance: u8,
) -> Result<()> {
    let [er, eg, eb] = expected;
    for y in 0..rect.height {
        for x in 0..rect.width {
            let [r, g, b, a] = pixel_in(data, stride, rect, x, y)?;
            if a != 0xff || !colors_match((r, g, b), (er, eg, eb), tolerance) {
                return Err(CameraError::StreamError(format!(
                    "Pixel at ({}, {}) is RGBA({r}, {g}, {b}, {a}), expected RGB{expected:?}",
                    rect.x + x,
                    rect.y + y
                )));
            }
        }
    }
    Ok(())
}

/// Validates that `rect` contains the color bar pattern.
///
/// This function checks 8 vertical stripes at their center positions,
/// verifying that each stripe contains the expected color with a tolerance
/// for conversion inaccuracies.
///
/// # Errors
///
/// Returns `StreamError` if any color bar doesn't match the expected color
/// within tolerance.
pub fn validate_color_bars(data: &[u8], stride: usize, rect: &Rect) -> Result<()> {
    let bar_width = rect.width / 8;
    let center_y = rect.height / 2;

    for (bar_idx, expected_rgb) in (0u32..).zip(COLOR_BARS.iter()) {
        // Sample the center of each bar
        let sample_x = (bar_idx * bar_width) + (bar_width / 2);
        let [r, g, b, _] = pixel_in(data, stride, rect, sample_x, center_y)?;

        if !colors_match((r, g, b), *expected_rgb, COLOR_TOLERANCE) {
            return Err(CameraError::StreamError(format!(
                "Color bar {bar_idx} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected_rgb:?}, got RGB{:?}",
                (r, g, b)
            )));
        }
    }

    Ok(())
}

/// Validates that `rect` contains a horizontal gradient pattern.
///
/// This function samples a horizontal line at the center of the rectangle
/// and verifies that the luminance increases monotonically from left to
/// right, with a significant overall change (not a solid color).
///
/// # Errors
///
/// Returns `StreamError` if:
/// - The luminance doesn't increase monotonically
/// - The total luminance change is too small (solid color)
pub fn validate_gradient(data: &[u8], stride: usize, rect: &Rect) -> Result<()> {
    let center_y = rect.height / 2;

    // Sample every 10 pixels to check for monotonic increase
    let sample_step = 10usize;
    let mut first_luminance: Option<f32> = None;
    let mut prev_luminance: Option<f32> = None;
    let mut last_luminance: Option<f32> = None;

    for x in (0..rect.width).step_by(sample_step) {
        let [r, g, b, _] = pixel_in(data, stride, rect, x, center_y)?;

        // Calculate luminance (Y' in Rec. 601)
        let luminance = 0.114f32.mul_add(
            f32::from(b),
            0.587f32.mul_add(f32::from(g), 0.299 * f32::from(r)),
        );

        if first_luminance.is_none() {
            first_luminance = Some(luminance);
        }

        if let Some(prev) = prev_luminance {
            if luminance < prev - 1.0 {
                // Allow small decreases due to rounding
                return Err(CameraError::StreamError(format!(
                    "Gradient not monotonically increasing at x={x}: \
                     luminance {luminance} < previous {prev}"
                )));
            }
        }

        prev_luminance = Some(luminance);
        last_luminance = Some(luminance);
    }

    // Check that there's a significant luminance change across the row
    if let (Some(first), Some(last)) = (first_luminance, last_luminance) {
        let luminance_change = last - first;
        if luminance_change < 50.0 {
            return Err(CameraError::StreamError(format!(
                "Insufficient luminance change for gradient: {luminance_change} \
                 (expected at least 50.0)"
            )));
        }
    }

    Ok(())
}

/// Helper function to check if two RGB colors match within a tolerance.
fn colors_match(actual: (u8, u8, u8), expected: (u8, u8, u8), tolerance: u8) -> bool {
    let (ar, ag, ab) = actual;
    let (er, eg, eb) = expected;

    ar.abs_diff(er) <= tolerance && ag.abs_diff(eg) <= tolerance && ab.abs_diff(eb) <= tolerance
}
