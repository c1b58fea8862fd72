//! Mock camera manager and drivers for testing without hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::channel::FrameSink;
use crate::convert::ChromaOrder;
use crate::traits::{
    CameraError, CameraManager, CaptureDriver, CaptureProperty, FourCC, Frame, FrameMetadata,
    Result,
};

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// How a mock camera behaves once acquired.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Capture thread delivering the patterns in turn, one per frame.
    Push {
        /// Patterns cycled frame by frame.
        patterns: Vec<TestPattern>,
        /// Delay between frames.
        interval: Duration,
    },
    /// No thread; frames are produced on `get_frame`.
    Pull(TestPattern),
    /// `open` fails.
    FailOpen,
    /// `start` fails.
    FailStart,
    /// `open` negotiates a different size than requested.
    WrongSize,
    /// `open` substitutes `fourcc` for the requested format; frames are
    /// pulled in that format.
    WrongFormat {
        /// Format the driver settles on.
        fourcc: FourCC,
        /// Pattern produced on `get_frame`.
        pattern: TestPattern,
    },
}

impl MockBehavior {
    /// Push a single pattern roughly every `interval`.
    pub fn push(pattern: TestPattern, interval: Duration) -> Self {
        Self::Push {
            patterns: vec![pattern],
            interval,
        }
    }
}

/// Lifecycle accounting shared by a manager and all its drivers.
#[derive(Debug, Default)]
pub struct MockStats {
    /// Drivers handed out.
    pub acquired: AtomicUsize,
    /// Drivers currently alive.
    pub live: AtomicUsize,
    /// Successful `open` calls.
    pub opened: AtomicUsize,
    /// Successful `start` calls.
    pub started: AtomicUsize,
    /// `stop` calls on a started driver.
    pub stopped: AtomicUsize,
    /// `close` calls.
    pub closed: AtomicUsize,
    /// Frames pushed by capture threads.
    pub pushed: AtomicUsize,
}

impl MockStats {
    /// Read a counter.
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Camera manager handing out mock drivers.
pub struct MockManager {
    cameras: Vec<Option<MockBehavior>>,
    stats: Arc<MockStats>,
}

impl MockManager {
    /// `count` cameras that all behave the same way.
    #[must_use]
    pub fn new(count: usize, behavior: &MockBehavior) -> Self {
        Self {
            cameras: vec![Some(behavior.clone()); count],
            stats: Arc::new(MockStats::default()),
        }
    }

    /// A manager reporting no cameras.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cameras: Vec::new(),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Override camera `index`; `None` makes it unavailable.
    #[must_use]
    pub fn with_camera(mut self, index: usize, behavior: Option<MockBehavior>) -> Self {
        if self.cameras.len() <= index {
            self.cameras.resize(index + 1, None);
        }
        if let Some(slot) = self.cameras.get_mut(index) {
            *slot = behavior;
        }
        self
    }

    /// Shared lifecycle counters.
    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

impl CameraManager for MockManager {
    type Driver = MockDriver;

    fn max_camera(&self) -> usize {
        self.cameras.iter().filter(|camera| camera.is_some()).count()
    }

    fn camera_by_seq(&mut self, index: usize) -> Option<MockDriver> {
        let behavior = self.cameras.get(index)?.clone()?;
        let id = u32::try_from(index).ok()?;
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        self.stats.live.fetch_add(1, Ordering::SeqCst);
        Some(MockDriver {
            id,
            behavior,
            property: None,
            stats: Arc::clone(&self.stats),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
            pulled: 0,
        })
    }
}

/// Mock driver for testing without hardware.
pub struct MockDriver {
    id: u32,
    behavior: MockBehavior,
    property: Option<CaptureProperty>,
    stats: Arc<MockStats>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    pulled: u32,
}

impl CaptureDriver for MockDriver {
    fn id(&self) -> u32 {
        self.id
    }

    fn open(&mut self, property: &CaptureProperty) -> Result<CaptureProperty> {
        let negotiated = match self.behavior {
            MockBehavior::FailOpen => {
                return Err(CameraError::DeviceOpenFailed(format!("mock {}", self.id)));
            }
            MockBehavior::WrongSize => CaptureProperty::new(
                property.width + 2,
                property.height,
                property.fourcc,
                property.fps,
            ),
            MockBehavior::WrongFormat { fourcc, .. } => {
                CaptureProperty::new(property.width, property.height, fourcc, property.fps)
            }
            _ => property.clone(),
        };
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        self.property = Some(negotiated.clone());
        Ok(negotiated)
    }

    fn start(&mut self, mut sink: FrameSink) -> Result<()> {
        let property = self
            .property
            .clone()
            .ok_or_else(|| CameraError::StreamError("start before open".to_owned()))?;

        match &self.behavior {
            MockBehavior::FailStart => {
                return Err(CameraError::StreamError(format!("mock {} refused", self.id)));
            }
            MockBehavior::Push { patterns, interval } => {
                let frames: Vec<Vec<u8>> = patterns
                    .iter()
                    .map(|pattern| generate_test_frame(&property, *pattern))
                    .collect();
                let interval = *interval;
                let stop = Arc::clone(&self.stop);
                let stats = Arc::clone(&self.stats);
                self.thread = Some(thread::spawn(move || {
                    for frame in frames.iter().cycle() {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        let _ = sink.deliver(frame, &property);
                        stats.pushed.fetch_add(1, Ordering::SeqCst);
                        if interval.is_zero() {
                            thread::yield_now();
                        } else {
                            thread::sleep(interval);
                        }
                    }
                }));
            }
            _ => {}
        }

        self.stats.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.stats.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.property = None;
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn get_frame(&mut self) -> Result<Option<Frame>> {
        let pattern = match &self.behavior {
            MockBehavior::Pull(pattern) | MockBehavior::WrongFormat { pattern, .. } => *pattern,
            _ => return Ok(None),
        };
        let Some(property) = &self.property else {
            return Ok(None);
        };
        let sequence = self.pulled;
        self.pulled += 1;
        Ok(Some(Frame {
            data: generate_test_frame(property, pattern),
            metadata: FrameMetadata {
                sequence,
                timestamp: Duration::from_millis(u64::from(sequence) * 33), // ~30fps
                bytes_used: property.size,
            },
        }))
    }
}

impl Drop for MockDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.stats.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generate a packed 4:2:2 frame for `property`, in `Y U Y V` order when
/// the format is YUYV and `Y V Y U` otherwise.
pub fn generate_test_frame(property: &CaptureProperty, pattern: TestPattern) -> Vec<u8> {
    let mut data = vec![0u8; property.size as usize];
    let order = ChromaOrder::from_fourcc(property.fourcc).unwrap_or_default();

    match pattern {
        TestPattern::ColorBars => {
            generate_color_bars(&mut data, property.width, property.height, order);
        }
        TestPattern::Gradient => {
            generate_gradient(&mut data, property.width, property.height, order);
        }
        TestPattern::Solid(y, u, v) => {
            generate_solid(&mut data, (y, u, v), order);
        }
    }

    data
}

fn put_macropixel(data: &mut [u8], offset: usize, (y, u, v): (u8, u8, u8), order: ChromaOrder) {
    let bytes = match order {
        ChromaOrder::Yvyu => [y, v, y, u],
        ChromaOrder::Yuyv => [y, u, y, v],
    };
    if let Some(slot) = data.get_mut(offset..offset + 4) {
        slot.copy_from_slice(&bytes);
    }
}

/// Generate color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32, order: ChromaOrder) {
    // 8 color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128), // White
        (210, 16, 146),  // Yellow
        (170, 166, 16),  // Cyan
        (145, 54, 34),   // Green
        (106, 202, 222), // Magenta
        (81, 90, 240),   // Red
        (41, 240, 110),  // Blue
        (16, 128, 128),  // Black
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let Some(&yuv) = bars.get(bar_idx) else {
                continue;
            };
            let offset = ((y * width + x) * 2) as usize;
            put_macropixel(data, offset, yuv, order);
        }
    }
}

/// Generate horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32, height: u32, order: ChromaOrder) {
    for y in 0..height {
        for x in (0..width).step_by(2) {
            #[allow(clippy::cast_possible_truncation)]
            let y_val = ((x * 255) / width) as u8;
            let offset = ((y * width + x) * 2) as usize;
            put_macropixel(data, offset, (y_val, 128, 128), order);
        }
    }
}

/// Generate solid color frame.
fn generate_solid(data: &mut [u8], yuv: (u8, u8, u8), order: ChromaOrder) {
    for offset in (0..data.len()).step_by(4) {
        put_macropixel(data, offset, yuv, order);
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::traits::FourCC;

    fn property() -> CaptureProperty {
        CaptureProperty::new(640, 480, FourCC::YVYU, 30)
    }

    #[test]
    fn test_manager_counts_available_cameras() {
        let manager = MockManager::new(4, &MockBehavior::Pull(TestPattern::Gradient))
            .with_camera(2, None);
        assert_eq!(manager.max_camera(), 3);
        assert_eq!(MockManager::empty().max_camera(), 0);
    }

    #[test]
    fn test_missing_camera_is_not_supplied() {
        let mut manager =
            MockManager::new(2, &MockBehavior::Pull(TestPattern::Gradient)).with_camera(1, None);
        assert!(manager.camera_by_seq(0).is_some());
        assert!(manager.camera_by_seq(1).is_none());
        assert!(manager.camera_by_seq(7).is_none());
    }

    #[test]
    fn test_driver_drop_is_tracked() {
        let mut manager = MockManager::new(1, &MockBehavior::Pull(TestPattern::Gradient));
        let stats = manager.stats();
        let driver = manager.camera_by_seq(0).expect("camera 0");
        assert_eq!(MockStats::get(&stats.live), 1);
        drop(driver);
        assert_eq!(MockStats::get(&stats.live), 0);
    }

    #[test]
    fn test_pull_driver_sequences_frames() {
        let mut manager = MockManager::new(1, &MockBehavior::Pull(TestPattern::Solid(1, 2, 3)));
        let mut driver = manager.camera_by_seq(0).expect("camera 0");
        assert!(driver.get_frame().expect("get_frame").is_none(), "not opened yet");

        driver.open(&property()).expect("open");
        let first = driver.get_frame().expect("get_frame").expect("frame");
        let second = driver.get_frame().expect("get_frame").expect("frame");
        assert_eq!(first.metadata.sequence, 0);
        assert_eq!(second.metadata.sequence, 1);
        assert_eq!(&first.data[..4], &[1, 3, 1, 2]);
    }

    #[test]
    fn test_wrong_format_negotiation_pulls_yuyv() {
        let behavior = MockBehavior::WrongFormat {
            fourcc: FourCC::YUYV,
            pattern: TestPattern::Solid(1, 2, 3),
        };
        let mut manager = MockManager::new(1, &behavior);
        let mut driver = manager.camera_by_seq(0).expect("camera 0");
        let negotiated = driver.open(&property()).expect("open");
        assert_eq!(negotiated.fourcc, FourCC::YUYV);

        let frame = driver.get_frame().expect("get_frame").expect("frame");
        assert_eq!(&frame.data[..4], &[1, 2, 1, 3]);
    }

    #[test]
    fn test_wrong_size_negotiation() {
        let mut manager = MockManager::new(1, &MockBehavior::WrongSize);
        let mut driver = manager.camera_by_seq(0).expect("camera 0");
        let negotiated = driver.open(&property()).expect("open");
        assert_eq!(negotiated.width, 642);
    }

    #[test]
    fn test_color_bars_pattern() {
        let data = generate_test_frame(&property(), TestPattern::ColorBars);

        // Check frame size
        assert_eq!(data.len(), 640 * 480 * 2);

        // First bar should be white (Y=235)
        assert_eq!(data[0], 235);
    }

    #[test]
    fn test_gradient_pattern() {
        let data = generate_test_frame(&property(), TestPattern::Gradient);

        // Left edge should be dark
        assert!(data[0] < 10);

        // Right edge should be bright (check last row, last pixel)
        let last_row_start = 479 * 640 * 2;
        let last_pixel_y = data[last_row_start + 638 * 2];
        assert!(last_pixel_y > 200);
    }

    #[test]
    fn test_solid_pattern_byte_order() {
        let data = generate_test_frame(
            &CaptureProperty::new(64, 64, FourCC::YVYU, 30),
            TestPattern::Solid(128, 64, 192),
        );

        // Y V Y U
        assert_eq!(data[0], 128);
        assert_eq!(data[1], 192);
        assert_eq!(data[2], 128);
        assert_eq!(data[3], 64);
    }
}
