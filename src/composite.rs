//! The shared RGBA composite buffer and its lock.
//!
//! Every write into the composite and every full-buffer read goes through
//! the one mutex in [`Shared`]. Producers write disjoint quadrants, but a
//! consumer must never observe a quadrant mid-conversion.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::validate_composite;
use crate::convert::{yuv422_to_rgba, ChromaOrder, RGBA_BYTES_PER_PIXEL};
use crate::layout::Rect;
use crate::observer::FrameObserver;
use crate::traits::{CameraError, Result};

/// Packed RGBA8888 image holding all four quadrants.
#[derive(Debug, Default)]
pub struct CompositeBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    epoch: u64,
}

impl CompositeBuffer {
    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub const fn stride(&self) -> usize {
        self.width as usize * RGBA_BYTES_PER_PIXEL
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether a buffer is currently allocated.
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    /// Allocation generation. Bumped on every allocate or release.
    pub(crate) const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replace the allocation with a zeroed `width` x `height` image that
    /// splits into four convertible quadrants.
    ///
    /// The prior allocation is freed before the new one is made. On error
    /// the prior allocation is untouched.
    pub(crate) fn allocate(&mut self, width: u32, height: u32) -> Result<u64> {
        validate_composite(width, height)?;
        Ok(self.allocate_frame(width, height))
    }

    /// Replace the allocation with a zeroed whole-frame image. No quadrant
    /// geometry is required; the caller checks the size is usable.
    pub(crate) fn allocate_frame(&mut self, width: u32, height: u32) -> u64 {
        self.release();

        let len = width as usize * height as usize * RGBA_BYTES_PER_PIXEL;
        self.data = vec![0; len];
        self.width = width;
        self.height = height;
        debug!(width, height, bytes = len, epoch = self.epoch, "composite allocated");
        self.epoch
    }

    /// Free the allocation. Safe to call repeatedly.
    pub(crate) fn release(&mut self) {
        self.data = Vec::new();
        self.width = 0;
        self.height = 0;
        self.epoch += 1;
    }

    /// Zero every byte.
    pub(crate) fn clear(&mut self) {
        self.data.fill(0);
    }

    fn check_binding(&self, epoch: u64) -> Result<()> {
        if epoch == self.epoch && self.is_allocated() {
            Ok(())
        } else {
            Err(CameraError::StaleBinding)
        }
    }

    /// Convert a packed 4:2:2 frame into `rect`.
    pub(crate) fn write_yuv(
        &mut self,
        epoch: u64,
        rect: &Rect,
        src: &[u8],
        src_stride: usize,
        order: ChromaOrder,
    ) -> Result<()> {
        self.check_binding(epoch)?;
        if rect.x + rect.width > self.width || rect.y + rect.height > self.height {
            return Err(CameraError::InvalidDimensions(format!(
                "{rect:?} outside {}x{} composite",
                self.width, self.height
            )));
        }

        let stride = self.stride();
        let actual = self.data.len();
        let offset = rect.offset(stride);
        let dst = self
            .data
            .get_mut(offset..)
            .ok_or(CameraError::BufferTooSmall {
                needed: offset,
                actual,
            })?;
        yuv422_to_rgba(
            src,
            rect.width as usize,
            src_stride,
            rect.height as usize,
            dst,
            stride,
            order,
        )
    }

    /// Copy a full-size RGBA frame over the whole composite.
    pub(crate) fn write_rgba(&mut self, src: &[u8]) -> Result<()> {
        let src = src
            .get(..self.data.len())
            .ok_or(CameraError::BufferTooSmall {
                needed: self.data.len(),
                actual: src.len(),
            })?;
        self.data.copy_from_slice(src);
        Ok(())
    }
}

/// State shared between the source, its frame sinks and consumers.
pub(crate) struct Shared {
    buffer: Mutex<CompositeBuffer>,
    pub(crate) observer: Arc<dyn FrameObserver>,
}

impl Shared {
    pub(crate) fn new(observer: Arc<dyn FrameObserver>) -> Self {
        Self {
            buffer: Mutex::new(CompositeBuffer::default()),
            observer,
        }
    }

    /// Take the composite lock. A producer that panicked mid-write leaves
    /// at worst a torn quadrant, so poisoning is not fatal.
    pub(crate) fn lock(&self) -> MutexGuard<'_, CompositeBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
