//! Packed YUV 4:2:2 to RGBA8888 conversion.
//!
//! The source layout is a sequence of 4-byte macropixels `Y0 V Y1 U` (or
//! `Y0 U Y1 V` for YUYV sources), each encoding two horizontally adjacent
//! pixels that share chroma. Every macropixel becomes two RGBA pixels with
//! alpha fixed at 255.
//!
//! Conversion is the BT.601 studio-range fixed-point transform:
//!
//! ```text
//! R = clip((298 * (Y - 16)                   + 409 * (V - 128) + 128) >> 8)
//! G = clip((298 * (Y - 16) - 100 * (U - 128) - 208 * (V - 128) + 128) >> 8)
//! B = clip((298 * (Y - 16) + 516 * (U - 128)                   + 128) >> 8)
//! ```
//!
//! Input and output strides are independent, so the destination may be a
//! sub-rectangle of a larger image.

use crate::traits::{CameraError, FourCC, Result};

/// Bytes per RGBA output pixel.
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Bytes per packed 4:2:2 input pixel.
pub const YUV422_BYTES_PER_PIXEL: usize = 2;

const ALPHA_OPAQUE: u8 = 0xff;

/// Position of the two chroma bytes inside a packed 4:2:2 macropixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaOrder {
    /// `Y0 V Y1 U`
    #[default]
    Yvyu,
    /// `Y0 U Y1 V`
    Yuyv,
}

impl ChromaOrder {
    /// Chroma order for a packed 4:2:2 pixel format, `None` for anything else.
    #[must_use]
    pub const fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.0 {
            b"YVYU" => Some(Self::Yvyu),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }

    /// Split a macropixel into `(y0, u, y1, v)`.
    const fn unpack(self, macropixel: [u8; 4]) -> (u8, u8, u8, u8) {
        let [y0, c0, y1, c1] = macropixel;
        match self {
            Self::Yvyu => (y0, c1, y1, c0),
            Self::Yuyv => (y0, c0, y1, c1),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn clip(value: i32) -> u8 {
    if value < 0 {
        0
    } else if value > 255 {
        255
    } else {
        value as u8
    }
}

/// Convert a single Y/U/V triple to `[r, g, b]`.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub const fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    [
        clip((c + 409 * e + 128) >> 8),
        clip((c - 100 * d - 208 * e + 128) >> 8),
        clip((c + 516 * d + 128) >> 8),
    ]
}

/// Bytes a strided image occupies: every row but the last spans `stride`,
/// the last only needs `row_bytes`.
const fn required_len(row_bytes: usize, stride: usize, height: usize) -> usize {
    if height == 0 {
        0
    } else {
        (height - 1) * stride + row_bytes
    }
}

/// Convert `height` rows of `width` `Y V Y U` pixels from `src` into `dst`.
///
/// `src_stride` and `dst_stride` are in bytes. `width` must be even.
pub fn yvyu_to_rgba(
    src: &[u8],
    width: usize,
    src_stride: usize,
    height: usize,
    dst: &mut [u8],
    dst_stride: usize,
) -> Result<()> {
    yuv422_to_rgba(src, width, src_stride, height, dst, dst_stride, ChromaOrder::Yvyu)
}

/// Same as [`yvyu_to_rgba`] for `Y U Y V` sources.
pub fn yuyv_to_rgba(
    src: &[u8],
    width: usize,
    src_stride: usize,
    height: usize,
    dst: &mut [u8],
    dst_stride: usize,
) -> Result<()> {
    yuv422_to_rgba(src, width, src_stride, height, dst, dst_stride, ChromaOrder::Yuyv)
}

/// Convert packed 4:2:2 rows with the given chroma `order`.
pub fn yuv422_to_rgba(
    src: &[u8],
    width: usize,
    src_stride: usize,
    height: usize,
    dst: &mut [u8],
    dst_stride: usize,
    order: ChromaOrder,
) -> Result<()> {
    if width % 2 != 0 {
        return Err(CameraError::InvalidDimensions(format!(
            "width {width} is not a whole number of macropixels"
        )));
    }

    let src_row = width * YUV422_BYTES_PER_PIXEL;
    let dst_row = width * RGBA_BYTES_PER_PIXEL;
    if src_stride < src_row || dst_stride < dst_row {
        return Err(CameraError::InvalidDimensions(format!(
            "stride too small for width {width}: src {src_stride}, dst {dst_stride}"
        )));
    }

    let needed = required_len(src_row, src_stride, height);
    if src.len() < needed {
        return Err(CameraError::BufferTooSmall {
            needed,
            actual: src.len(),
        });
    }
    let needed = required_len(dst_row, dst_stride, height);
    if dst.len() < needed {
        return Err(CameraError::BufferTooSmall {
            needed,
            actual: dst.len(),
        });
    }
    if width == 0 {
        return Ok(());
    }

    let rows = src.chunks(src_stride).zip(dst.chunks_mut(dst_stride));
    for (src_line, dst_line) in rows.take(height) {
        let (Some(src_line), Some(dst_line)) =
            (src_line.get(..src_row), dst_line.get_mut(..dst_row))
        else {
            break;
        };
        convert_row(src_line, dst_line, order);
    }

    Ok(())
}

fn convert_row(src: &[u8], dst: &mut [u8], order: ChromaOrder) {
    for (macropixel, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(8)) {
        let &[a, b, c, d] = macropixel else {
            continue;
        };
        let (y0, u, y1, v) = order.unpack([a, b, c, d]);
        let [r0, g0, b0] = yuv_to_rgb(y0, u, v);
        let [r1, g1, b1] = yuv_to_rgb(y1, u, v);
        out.copy_from_slice(&[r0, g0, b0, ALPHA_OPAQUE, r1, g1, b1, ALPHA_OPAQUE]);
    }
}
