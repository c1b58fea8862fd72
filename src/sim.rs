//! File-backed substitute for live cameras.
//!
//! A simulation file is a flat run of fixed-size frames with no header.
//! Frame `n` starts at byte `n * frame_bytes`; trailing bytes that do not
//! fill a whole frame are ignored.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::composite::CompositeBuffer;
use crate::convert::{ChromaOrder, RGBA_BYTES_PER_PIXEL, YUV422_BYTES_PER_PIXEL};
use crate::layout::Rect;
use crate::traits::{CameraError, Result};

/// Pixel layout of the frames stored in a simulation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFormat {
    /// Pre-converted RGBA8888 frames, copied as-is. Bytes must already be
    /// in R, G, B, A order, the order consumers read the composite in.
    Rgba,
    /// Packed `Y V Y U` frames, converted on read.
    Yuv,
}

/// An open simulation file and its read cursor.
#[derive(Debug)]
pub struct SimulationContext {
    file: File,
    path: PathBuf,
    format: SimFormat,
    width: u32,
    height: u32,
    input_bytes: usize,
    output_bytes: usize,
    total_frames: u64,
    next: u64,
    scratch: Vec<u8>,
}

impl SimulationContext {
    /// Open `path` as a run of `width` x `height` frames with `depth` bytes
    /// per input pixel.
    pub fn open<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        depth: u32,
        format: SimFormat,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if width == 0 || height == 0 || depth == 0 {
            return Err(CameraError::InvalidDimensions(format!(
                "simulation frame {width}x{height}x{depth}"
            )));
        }
        if format == SimFormat::Yuv && (width % 2 != 0 || (depth as usize) < YUV422_BYTES_PER_PIXEL)
        {
            return Err(CameraError::InvalidDimensions(format!(
                "YUV simulation needs even width and depth >= 2, got {width}x{height}x{depth}"
            )));
        }

        let pixels = width as usize * height as usize;
        let input_bytes = pixels * depth as usize;
        let output_bytes = pixels * RGBA_BYTES_PER_PIXEL;
        let frame_bytes = match format {
            SimFormat::Rgba => output_bytes,
            SimFormat::Yuv => input_bytes,
        };

        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        let total_frames = length / frame_bytes as u64;
        if total_frames == 0 {
            return Err(CameraError::BufferTooSmall {
                needed: frame_bytes,
                actual: usize::try_from(length).unwrap_or(usize::MAX),
            });
        }

        info!(
            path = %path.display(),
            ?format,
            length,
            total_frames,
            "simulation file opened"
        );

        Ok(Self {
            file,
            path,
            format,
            width,
            height,
            input_bytes,
            output_bytes,
            total_frames,
            next: 0,
            scratch: Vec::new(),
        })
    }

    /// Frame layout of the file.
    pub const fn format(&self) -> SimFormat {
        self.format
    }

    /// Frame width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Path the context was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole frames in the file.
    pub const fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Bytes one stored frame occupies in the file.
    pub const fn frame_bytes(&self) -> usize {
        match self.format {
            SimFormat::Rgba => self.output_bytes,
            SimFormat::Yuv => self.input_bytes,
        }
    }

    /// Bytes one frame occupies once converted to RGBA.
    pub const fn output_bytes(&self) -> usize {
        self.output_bytes
    }

    /// Index the next [`read_next`](Self::read_next) will serve.
    pub const fn position(&self) -> u64 {
        self.next
    }

    /// Read the raw bytes of frame `index`.
    pub fn read_raw(&mut self, index: u64) -> Result<&[u8]> {
        if index >= self.total_frames {
            return Err(CameraError::FrameOutOfRange {
                index,
                total: self.total_frames,
            });
        }
        let frame_bytes = self.frame_bytes();
        self.scratch.resize(frame_bytes, 0);
        self.file
            .seek(SeekFrom::Start(index * frame_bytes as u64))?;
        self.file.read_exact(&mut self.scratch)?;
        Ok(&self.scratch)
    }

    /// Read frame `index` into `buffer`, converting YUV frames to RGBA.
    ///
    /// `buffer` must be allocated at the simulation resolution.
    pub fn read_frame(&mut self, index: u64, buffer: &mut CompositeBuffer) -> Result<()> {
        if buffer.width() != self.width || buffer.height() != self.height {
            return Err(CameraError::InvalidDimensions(format!(
                "composite {}x{} does not match simulation {}x{}",
                buffer.width(),
                buffer.height(),
                self.width,
                self.height
            )));
        }

        let format = self.format;
        let src_stride = self.input_bytes / self.height as usize;
        let full = Rect {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        };
        let epoch = buffer.epoch();
        let frame = self.read_raw(index)?;
        match format {
            SimFormat::Rgba => buffer.write_rgba(frame),
            SimFormat::Yuv => {
                buffer.write_yuv(epoch, &full, frame, src_stride, ChromaOrder::Yvyu)
            }
        }
    }

    /// Read the frame at the cursor and advance, wrapping after the last.
    /// Returns the index that was read.
    pub fn read_next(&mut self, buffer: &mut CompositeBuffer) -> Result<u64> {
        let index = self.next;
        self.read_frame(index, buffer)?;
        self.next = (index + 1) % self.total_frames;
        debug!(index, next = self.next, "simulation frame read");
        Ok(index)
    }
}
