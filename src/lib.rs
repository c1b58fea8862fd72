//! Quad-Cam-Capture: four-camera capture compositor over V4L2
//!
//! Up to four capture channels deliver packed `Y V Y U` 4:2:2 frames, each
//! converted to RGBA8888 into a fixed quadrant of one shared composite
//! buffer. A single consumer borrows the composite with
//! [`CameraSource::get_frame_data`]; a raw frame file can stand in for the
//! cameras. Driver access sits behind the [`CaptureDriver`] and
//! [`CameraManager`] traits, enabling both production use with real
//! hardware and testing with mock drivers.

pub mod channel;
pub mod composite;
pub mod config;
pub mod convert;
pub mod device;
pub mod layout;
pub mod observer;
pub mod sim;
pub mod source;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use channel::{Channel, FrameSink};
pub use composite::CompositeBuffer;
pub use config::SourceConfig;
pub use device::{V4l2Driver, V4l2Manager};
pub use layout::{Quadrant, Rect, MAX_CAMERAS};
pub use observer::{FrameCounters, FrameObserver, NoopObserver};
pub use sim::{SimFormat, SimulationContext};
pub use source::{CameraSource, FrameGuard, SourceState};
pub use traits::{
    CameraError, CameraManager, CaptureDriver, CaptureProperty, FieldType, FourCC, Frame,
    FrameMetadata,
};
