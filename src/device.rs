//! V4L2 capture driver implementation using the v4l crate.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use crate::channel::FrameSink;
use crate::convert::ChromaOrder;
use crate::traits::{CameraError, CameraManager, CaptureDriver, CaptureProperty, FourCC, Result};

/// How long the capture thread blocks on a dequeue before rechecking the stop flag.
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);

/// Consecutive dequeue failures after which the capture thread gives up.
const MAX_STREAM_ERRORS: u32 = 8;

/// Default number of mmap buffers per stream.
pub const DEFAULT_BUFFER_COUNT: u32 = 4;

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Device>,
}

/// A V4L2 video node driven by a dedicated capture thread.
///
/// The device is moved into the capture thread on [`start`](CaptureDriver::start)
/// and handed back when the thread is joined.
pub struct V4l2Driver {
    index: u32,
    device: Option<Device>,
    property: Option<CaptureProperty>,
    buffer_count: u32,
    worker: Option<Worker>,
}

impl V4l2Driver {
    /// Open `/dev/video{index}`.
    pub fn new(index: u32, buffer_count: u32) -> Result<Self> {
        let device = Device::new(index as usize)
            .map_err(|err| CameraError::DeviceOpenFailed(format!("/dev/video{index}: {err}")))?;

        let caps = device
            .query_caps()
            .map_err(|err| CameraError::DeviceOpenFailed(err.to_string()))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE)
            || !caps.capabilities.contains(v4l::capability::Flags::STREAMING)
        {
            return Err(CameraError::DeviceOpenFailed(format!(
                "/dev/video{index} ({}) cannot stream video capture",
                caps.card
            )));
        }
        debug!(index, driver = %caps.driver, card = %caps.card, bus = %caps.bus, "device opened");

        Ok(Self {
            index,
            device: Some(device),
            property: None,
            buffer_count,
            worker: None,
        })
    }

    fn device(&self) -> Result<&Device> {
        self.device
            .as_ref()
            .ok_or_else(|| CameraError::StreamError(format!("/dev/video{} closed", self.index)))
    }

    fn join_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        match worker.handle.join() {
            Ok(device) => self.device = Some(device),
            Err(_) => error!(index = self.index, "capture thread panicked"),
        }
    }
}

/// The other packed 4:2:2 layout, `YUYV` for anything that is not `YUYV`.
fn alternate_422(fourcc: FourCC) -> FourCC {
    if fourcc == FourCC::YUYV {
        FourCC::YVYU
    } else {
        FourCC::YUYV
    }
}

impl CaptureDriver for V4l2Driver {
    fn id(&self) -> u32 {
        self.index
    }

    fn open(&mut self, property: &CaptureProperty) -> Result<CaptureProperty> {
        let device = self.device()?;
        let mut fmt = device
            .format()
            .map_err(|err| CameraError::StreamError(err.to_string()))?;

        fmt.width = property.width;
        fmt.height = property.height;
        fmt.field_order = property.field.into();

        // Either packed 4:2:2 order converts; try the other one before giving up.
        let mut accepted = None;
        for fourcc in [property.fourcc, alternate_422(property.fourcc)] {
            fmt.fourcc = fourcc.into();
            let applied = device
                .set_format(&fmt)
                .map_err(|err| CameraError::StreamError(err.to_string()))?;
            let negotiated = FourCC::from(applied.fourcc);
            if ChromaOrder::from_fourcc(negotiated).is_some() {
                if negotiated != property.fourcc {
                    debug!(
                        index = self.index,
                        requested = %property.fourcc,
                        %negotiated,
                        "driver substituted pixel format"
                    );
                }
                accepted = Some(applied);
                break;
            }
        }
        let fmt = accepted.ok_or_else(|| CameraError::FormatNotSupported(property.clone()))?;

        if let Err(err) = device.set_params(&Parameters::with_fps(property.fps)) {
            warn!(index = self.index, fps = property.fps, %err, "frame rate not applied");
        }

        let negotiated = CaptureProperty {
            width: fmt.width,
            height: fmt.height,
            fourcc: FourCC::from(fmt.fourcc),
            field: property.field,
            fps: property.fps,
            stride: fmt.stride,
            size: fmt.size,
        };
        info!(
            index = self.index,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = %negotiated.fourcc,
            stride = negotiated.stride,
            "format negotiated"
        );
        self.property = Some(negotiated.clone());
        Ok(negotiated)
    }

    fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.worker.is_some() {
            return Err(CameraError::StreamError(format!(
                "/dev/video{} already streaming",
                self.index
            )));
        }
        let property = self
            .property
            .clone()
            .ok_or_else(|| CameraError::StreamError("start before open".to_owned()))?;
        let device = self
            .device
            .take()
            .ok_or_else(|| CameraError::StreamError(format!("/dev/video{} closed", self.index)))?;

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let thread_stop = Arc::clone(&stop);
        let buffer_count = self.buffer_count;
        let handle = thread::Builder::new()
            .name(format!("capture-{}", sink.index()))
            .spawn(move || {
                capture_loop(&device, buffer_count, sink, &property, &thread_stop, &ready_tx);
                device
            })?;
        self.worker = Some(Worker { stop, handle });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.join_worker();
                Err(CameraError::StreamError(err.to_string()))
            }
            Err(_) => {
                self.join_worker();
                Err(CameraError::StreamError(
                    "capture thread exited before streaming".to_owned(),
                ))
            }
        }
    }

    fn stop(&mut self) {
        if self.worker.is_some() {
            debug!(index = self.index, "stopping capture thread");
            self.join_worker();
        }
    }

    fn close(&mut self) {
        self.stop();
        self.property = None;
        if self.device.take().is_some() {
            debug!(index = self.index, "device closed");
        }
    }
}

impl Drop for V4l2Driver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    device: &Device,
    buffer_count: u32,
    mut sink: FrameSink,
    property: &CaptureProperty,
    stop: &AtomicBool,
    ready: &mpsc::SyncSender<io::Result<()>>,
) {
    let mut stream = match Stream::with_buffers(device, Type::VideoCapture, buffer_count) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    stream.set_timeout(DEQUEUE_TIMEOUT);
    let _ = ready.send(Ok(()));

    let mut failures = 0u32;
    while !stop.load(Ordering::Acquire) {
        match V4lCaptureStream::next(&mut stream) {
            Ok((buf, meta)) => {
                failures = 0;
                let data = buf.get(..meta.bytesused as usize).unwrap_or(buf);
                if let Err(err) = sink.deliver(data, property) {
                    trace!(channel = sink.index(), %err, "delivery failed");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
            Err(err) => {
                failures += 1;
                warn!(channel = sink.index(), %err, failures, "dequeue failed");
                if failures >= MAX_STREAM_ERRORS {
                    error!(channel = sink.index(), "too many stream errors, capture stopped");
                    break;
                }
            }
        }
    }
    debug!(
        channel = sink.index(),
        frames = sink.delivered(),
        "capture thread exiting"
    );
}

/// Hands out [`V4l2Driver`]s for a fixed list of video nodes.
///
/// Channel `n` maps to the `n`th entry of the list.
#[derive(Debug, Clone)]
pub struct V4l2Manager {
    devices: Vec<u32>,
    buffer_count: u32,
}

impl V4l2Manager {
    /// Use the given `/dev/videoN` indices, in channel order.
    #[must_use]
    pub const fn new(devices: Vec<u32>) -> Self {
        Self {
            devices,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }

    /// Enumerate all video nodes present on the system.
    #[must_use]
    pub fn discover() -> Self {
        let mut devices: Vec<u32> = v4l::context::enum_devices()
            .iter()
            .filter_map(|node| u32::try_from(node.index()).ok())
            .collect();
        devices.sort_unstable();
        info!(?devices, "video nodes discovered");
        Self::new(devices)
    }

    /// Set the number of mmap buffers each stream allocates.
    #[must_use]
    pub const fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// The configured node indices.
    pub fn devices(&self) -> &[u32] {
        &self.devices
    }
}

impl CameraManager for V4l2Manager {
    type Driver = V4l2Driver;

    fn max_camera(&self) -> usize {
        self.devices.len()
    }

    fn camera_by_seq(&mut self, index: usize) -> Option<Self::Driver> {
        let node = *self.devices.get(index)?;
        match V4l2Driver::new(node, self.buffer_count) {
            Ok(driver) => Some(driver),
            Err(err) => {
                warn!(channel = index, node, %err, "camera unavailable");
                None
            }
        }
    }
}
