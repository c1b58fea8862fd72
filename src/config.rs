//! Composite source configuration.

use crate::traits::{CameraError, CaptureProperty, FieldType, FourCC, Result};

/// Composite output and per-channel capture settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Composite width in pixels.
    pub width: u32,
    /// Composite height in pixels.
    pub height: u32,
    /// Frame rate requested from every channel.
    pub fps: u32,
    /// Interlacing mode requested from every channel.
    pub field_type: FieldType,
    /// Pixel format requested from every channel.
    pub pixel_format: FourCC,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            field_type: FieldType::Progressive,
            pixel_format: FourCC::YVYU,
        }
    }
}

impl SourceConfig {
    /// Override the composite resolution.
    #[must_use]
    pub const fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Override the requested frame rate.
    #[must_use]
    pub const fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Check that the composite splits into four convertible quadrants.
    pub fn validate(&self) -> Result<()> {
        validate_composite(self.width, self.height)?;
        if self.fps == 0 {
            return Err(CameraError::InvalidDimensions("fps must be positive".to_owned()));
        }
        Ok(())
    }

    /// Capture parameters requested from each channel: half the composite
    /// in both dimensions.
    #[must_use]
    pub const fn channel_property(&self) -> CaptureProperty {
        CaptureProperty::new(self.width / 2, self.height / 2, self.pixel_format, self.fps)
            .with_field(self.field_type)
    }
}

/// A composite must be non-empty, have an even height, and a width whose
/// half is still a whole number of macropixels.
pub fn validate_composite(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(CameraError::InvalidDimensions(format!(
            "empty composite {width}x{height}"
        )));
    }
    if width % 4 != 0 {
        return Err(CameraError::InvalidDimensions(format!(
            "composite width {width} must be a multiple of 4"
        )));
    }
    if height % 2 != 0 {
        return Err(CameraError::InvalidDimensions(format!(
            "composite height {height} must be even"
        )));
    }
    Ok(())
}
