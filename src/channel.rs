//! Capture channels and the per-channel frame sink.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::composite::{CompositeBuffer, Shared};
use crate::convert::ChromaOrder;
use crate::layout::{Quadrant, Rect};
use crate::traits::{CameraError, CaptureDriver, CaptureProperty, Result};

/// Frames (and drops) per channel logged at debug (and warn) level before
/// falling back to trace.
const VERBOSE_FRAMES: u64 = 8;

fn chroma_order(property: &CaptureProperty) -> Result<ChromaOrder> {
    ChromaOrder::from_fourcc(property.fourcc)
        .ok_or_else(|| CameraError::FormatNotSupported(property.clone()))
}

/// Frame callback bound to one channel's quadrant.
///
/// Drivers call [`deliver`](Self::deliver) from their capture thread for
/// every captured frame. The sink converts the frame straight into the
/// composite under the composite lock.
pub struct FrameSink {
    shared: Arc<Shared>,
    quadrant: Quadrant,
    rect: Rect,
    epoch: u64,
    delivered: u64,
    dropped: u64,
}

impl FrameSink {
    pub(crate) fn new(shared: Arc<Shared>, quadrant: Quadrant, rect: Rect, epoch: u64) -> Self {
        Self {
            shared,
            quadrant,
            rect,
            epoch,
            delivered: 0,
            dropped: 0,
        }
    }

    /// Channel index this sink writes for.
    pub const fn index(&self) -> usize {
        self.quadrant.index()
    }

    /// Destination rectangle inside the composite.
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// Frames written so far.
    pub const fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Frames rejected so far.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Convert one packed 4:2:2 frame (`YVYU` or `YUYV`) into this
    /// channel's quadrant.
    ///
    /// Frames whose geometry does not match the quadrant are dropped and
    /// reported to the observer.
    pub fn deliver(&mut self, data: &[u8], property: &CaptureProperty) -> Result<()> {
        let result = self.write(data, property);
        let index = self.index();
        match &result {
            Ok(()) => {
                let sequence = self.delivered;
                self.delivered += 1;
                if sequence < VERBOSE_FRAMES {
                    debug!(channel = index, sequence, bytes = data.len(), "frame converted");
                } else {
                    trace!(channel = index, sequence, "frame converted");
                }
                self.shared.observer.frame_converted(index, sequence);
            }
            Err(err) => {
                let dropped = self.dropped;
                self.dropped += 1;
                if dropped < VERBOSE_FRAMES {
                    warn!(channel = index, dropped, %err, "frame dropped");
                } else {
                    trace!(channel = index, dropped, %err, "frame dropped");
                }
                self.shared.observer.frame_dropped(index, err);
            }
        }
        result
    }

    fn write(&self, data: &[u8], property: &CaptureProperty) -> Result<()> {
        if property.width != self.rect.width || property.height != self.rect.height {
            return Err(CameraError::NegotiationMismatch {
                width: self.rect.width,
                height: self.rect.height,
                actual_width: property.width,
                actual_height: property.height,
            });
        }
        let order = chroma_order(property)?;
        self.shared
            .lock()
            .write_yuv(self.epoch, &self.rect, data, property.stride as usize, order)
    }
}

/// A live channel: a started driver bound to its quadrant.
pub struct ActiveChannel<D> {
    driver: D,
    property: CaptureProperty,
    order: ChromaOrder,
    rect: Rect,
    epoch: u64,
}

impl<D: CaptureDriver> ActiveChannel<D> {
    /// Negotiated capture parameters.
    pub const fn property(&self) -> &CaptureProperty {
        &self.property
    }

    /// Destination rectangle inside the composite.
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// The bound driver.
    pub const fn driver(&self) -> &D {
        &self.driver
    }
}

/// Per-index channel record. `Inactive` replaces a null driver handle.
pub enum Channel<D> {
    /// No driver bound.
    Inactive,
    /// Driver started and writing into its quadrant.
    Active(ActiveChannel<D>),
}

impl<D> Default for Channel<D> {
    fn default() -> Self {
        Self::Inactive
    }
}

impl<D: CaptureDriver> Channel<D> {
    /// Negotiate and start `driver` for `quadrant`.
    ///
    /// `Err` means the channel stays inactive; the driver has already been
    /// closed.
    pub(crate) fn bind(
        mut driver: D,
        quadrant: Quadrant,
        requested: &CaptureProperty,
        shared: &Arc<Shared>,
        composite: (u32, u32),
        epoch: u64,
    ) -> Result<Self> {
        let (width, height) = composite;
        let rect = quadrant.rect(width, height);
        let index = quadrant.index();

        let property = match driver.open(requested) {
            Ok(property) => property,
            Err(err) => {
                driver.close();
                return Err(err);
            }
        };
        if property.width != rect.width || property.height != rect.height {
            driver.close();
            return Err(CameraError::NegotiationMismatch {
                width: rect.width,
                height: rect.height,
                actual_width: property.width,
                actual_height: property.height,
            });
        }
        let order = match chroma_order(&property) {
            Ok(order) => order,
            Err(err) => {
                driver.close();
                return Err(err);
            }
        };

        debug!(
            channel = index,
            driver = driver.id(),
            ?rect,
            fourcc = %property.fourcc,
            "starting channel"
        );
        let sink = FrameSink::new(Arc::clone(shared), quadrant, rect, epoch);
        if let Err(err) = driver.start(sink) {
            driver.close();
            return Err(err);
        }

        Ok(Self::Active(ActiveChannel {
            driver,
            property,
            order,
            rect,
            epoch,
        }))
    }

    /// Whether a driver is bound.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The live channel, if any.
    pub const fn active(&self) -> Option<&ActiveChannel<D>> {
        match self {
            Self::Active(active) => Some(active),
            Self::Inactive => None,
        }
    }

    /// Pull one frame from a pull-based driver into the composite.
    /// Returns the driver sequence number of the frame written, if any.
    ///
    /// Called with the composite lock already held by the consumer.
    pub(crate) fn pull_into(
        &mut self,
        index: usize,
        buffer: &mut CompositeBuffer,
    ) -> Result<Option<u64>> {
        let Self::Active(active) = self else {
            return Ok(None);
        };
        let Some(frame) = active.driver.get_frame()? else {
            return Ok(None);
        };
        let sequence = u64::from(frame.metadata.sequence);
        trace!(channel = index, sequence, "frame pulled");
        buffer.write_yuv(
            active.epoch,
            &active.rect,
            &frame.data,
            active.property.stride as usize,
            active.order,
        )?;
        Ok(Some(sequence))
    }

    /// Stop and close the bound driver. No-op when inactive.
    pub(crate) fn unbind(&mut self, index: usize) {
        if let Self::Active(mut active) = std::mem::take(self) {
            debug!(channel = index, driver = active.driver.id(), "stopping channel");
            active.driver.stop();
            active.driver.close();
        }
    }
}
