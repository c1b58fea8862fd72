//! Core traits and types for the capture driver abstraction.

use std::time::Duration;

use thiserror::Error;

use crate::channel::FrameSink;

/// Pixel format representation (e.g., YUYV, YVYU, RGBA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed, Y U Y V).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// YVYU pixel format (4:2:2 packed, Y V Y U). This is the macropixel
    /// order the pixel converter reads.
    pub const YVYU: Self = Self::new(b"YVYU");
    /// RGBA pixel format (32-bit, R G B A byte order). The composite and
    /// RGBA simulation files use this layout; B G R A data must be swizzled
    /// before it is fed in.
    pub const RGBA: Self = Self::new(b"RGBA");
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Interlacing mode requested from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    /// Let the driver choose.
    Any,
    /// Progressive frames.
    #[default]
    Progressive,
    /// Interleaved fields.
    Interlaced,
}

impl From<FieldType> for v4l::format::FieldOrder {
    fn from(field: FieldType) -> Self {
        match field {
            FieldType::Any => Self::Any,
            FieldType::Progressive => Self::Progressive,
            FieldType::Interlaced => Self::Interlaced,
        }
    }
}

/// Capture parameters negotiated with a driver when a channel starts.
///
/// Immutable once capture begins.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureProperty {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Interlacing mode.
    pub field: FieldType,
    /// Requested frame rate.
    pub fps: u32,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl CaptureProperty {
    /// Create a packed 4:2:2 capture property (2 bytes per pixel).
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC, fps: u32) -> Self {
        let stride = width * 2;
        let size = stride * height;
        Self {
            width,
            height,
            fourcc,
            field: FieldType::Progressive,
            fps,
            stride,
            size,
        }
    }

    /// Set the interlacing mode.
    #[must_use]
    pub const fn with_field(mut self, field: FieldType) -> Self {
        self.field = field;
        self
    }
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A raw captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// Error type for capture and compositing operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The camera manager reports no cameras.
    #[error("No camera available")]
    NoCameras,
    /// The camera manager cannot supply the requested channel index.
    #[error("Camera {0} not available")]
    CameraUnavailable(usize),
    /// Failed to open device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// Requested format is not supported.
    #[error("Format not supported: {0:?}")]
    FormatNotSupported(CaptureProperty),
    /// The driver negotiated different dimensions than requested.
    #[error("Negotiated {actual_width}x{actual_height}, expected {width}x{height}")]
    NegotiationMismatch {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Width the driver accepted.
        actual_width: u32,
        /// Height the driver accepted.
        actual_height: u32,
    },
    /// Width, height or stride unusable for the operation.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
    /// A source or destination buffer is shorter than its geometry requires.
    #[error("Buffer too small: need {needed} bytes, have {actual}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },
    /// Error during streaming operation.
    #[error("Stream error: {0}")]
    StreamError(String),
    /// The composite has not been allocated yet.
    #[error("Camera source not initialized")]
    NotInitialized,
    /// Requested simulation frame lies past the end of the file.
    #[error("Frame {index} out of range ({total} frames)")]
    FrameOutOfRange {
        /// Requested frame index.
        index: u64,
        /// Frames available.
        total: u64,
    },
    /// The frame was produced for a buffer allocation that no longer exists.
    #[error("Stale channel binding")]
    StaleBinding,
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// One camera's driver instance.
///
/// Push-based drivers deliver frames from their own capture thread through
/// the [`FrameSink`] handed to [`start`](Self::start). Pull-based drivers
/// return frames from [`get_frame`](Self::get_frame) instead.
pub trait CaptureDriver: Send {
    /// Driver-level identifier (e.g. the `/dev/videoN` index).
    fn id(&self) -> u32;

    /// Negotiate capture parameters. Returns the parameters the driver accepted.
    fn open(&mut self, property: &CaptureProperty) -> Result<CaptureProperty>;

    /// Start capturing, delivering frames into `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Stop capturing. The capture thread must be quiesced when this returns.
    fn stop(&mut self);

    /// Release the device.
    fn close(&mut self);

    /// Pull the most recent frame. Push-based drivers return `Ok(None)`.
    fn get_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }
}

/// Enumerates cameras and hands out driver instances by channel index.
pub trait CameraManager {
    /// The driver type this manager produces.
    type Driver: CaptureDriver;

    /// Number of cameras currently available.
    fn max_camera(&self) -> usize;

    /// Acquire the driver for channel `index`, if the manager can supply one.
    fn camera_by_seq(&mut self, index: usize) -> Option<Self::Driver>;
}
