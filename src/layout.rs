//! Fixed 2x2 placement of capture channels inside the composite image.

use crate::convert::RGBA_BYTES_PER_PIXEL;

/// Number of capture channels the composite supports.
pub const MAX_CAMERAS: usize = 4;

/// Destination quadrant of one channel.
///
/// The index order is a compatibility contract: 0 top-left, 1 top-right,
/// 2 bottom-right, 3 bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Channel 0 (front).
    TopLeft,
    /// Channel 1.
    TopRight,
    /// Channel 2 (rear).
    BottomRight,
    /// Channel 3.
    BottomLeft,
}

impl Quadrant {
    /// All quadrants in channel-index order.
    pub const ALL: [Self; MAX_CAMERAS] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    /// Quadrant for a channel index, if the index is supported.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Channel index of this quadrant.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::TopLeft => 0,
            Self::TopRight => 1,
            Self::BottomRight => 2,
            Self::BottomLeft => 3,
        }
    }

    /// Pixel rectangle of this quadrant in a `width` x `height` composite.
    #[must_use]
    pub const fn rect(self, width: u32, height: u32) -> Rect {
        let half_w = width / 2;
        let half_h = height / 2;
        let (x, y) = match self {
            Self::TopLeft => (0, 0),
            Self::TopRight => (half_w, 0),
            Self::BottomRight => (half_w, half_h),
            Self::BottomLeft => (0, half_h),
        };
        Rect {
            x,
            y,
            width: half_w,
            height: half_h,
        }
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Byte offset of the rectangle origin in an RGBA image with `stride` bytes per row.
    #[must_use]
    pub const fn offset(&self, stride: usize) -> usize {
        self.y as usize * stride + self.x as usize * RGBA_BYTES_PER_PIXEL
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the two rectangles share at least one pixel.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Whether `(px, py)` lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}
