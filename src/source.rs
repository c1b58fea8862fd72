//! Multi-camera composite source.
//!
//! [`CameraSource`] owns the composite buffer and one [`Channel`] per
//! supported camera index. Drivers write their frames into disjoint
//! quadrants from their own threads; consumers take a consistent snapshot
//! through [`CameraSource::get_frame_data`].

use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::channel::Channel;
use crate::composite::{CompositeBuffer, Shared};
use crate::config::SourceConfig;
use crate::layout::{Quadrant, MAX_CAMERAS};
use crate::observer::{FrameObserver, NoopObserver};
use crate::sim::{SimFormat, SimulationContext};
use crate::traits::{CameraError, CameraManager, Result};

/// Mask covering every supported channel index.
const ALL_CHANNELS: u32 = (1 << MAX_CAMERAS) - 1;

/// Lifecycle state of a [`CameraSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceState {
    /// Nothing allocated.
    None,
    /// Composite allocated, no channels running.
    Inited,
    /// Channels (or the simulation file) are feeding the composite.
    Opened,
}

/// Composite buffer manager driving up to four capture channels.
pub struct CameraSource<M: CameraManager> {
    manager: M,
    config: SourceConfig,
    shared: Arc<Shared>,
    channels: [Channel<M::Driver>; MAX_CAMERAS],
    state: SourceState,
    sim: Option<SimulationContext>,
}

impl<M: CameraManager> CameraSource<M> {
    /// Create a source with the default configuration and no observer.
    pub fn new(manager: M) -> Self {
        Self::build(manager, SourceConfig::default(), Arc::new(NoopObserver))
    }

    /// Create a source with an explicit configuration and observer.
    pub fn with_config(
        manager: M,
        config: SourceConfig,
        observer: Arc<dyn FrameObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(manager, config, observer))
    }

    fn build(manager: M, config: SourceConfig, observer: Arc<dyn FrameObserver>) -> Self {
        Self {
            manager,
            config,
            shared: Arc::new(Shared::new(observer)),
            channels: Default::default(),
            state: SourceState::None,
            sim: None,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SourceState {
        self.state
    }

    /// Active configuration.
    pub const fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// The camera manager.
    pub const fn manager(&self) -> &M {
        &self.manager
    }

    /// Channel record for `index`.
    pub fn channel(&self, index: usize) -> Option<&Channel<M::Driver>> {
        self.channels.get(index)
    }

    /// Bitmask of channels with a running driver.
    pub fn active_mask(&self) -> u32 {
        self.channels
            .iter()
            .zip(0u32..)
            .filter(|(channel, _)| channel.is_active())
            .fold(0, |mask, (_, bit)| mask | (1 << bit))
    }

    /// The configured simulation file, if any.
    pub const fn simulation(&self) -> Option<&SimulationContext> {
        self.sim.as_ref()
    }

    /// Allocate the composite. Idempotent; succeeds immediately once
    /// initialized or when a simulation file is configured.
    pub fn init(&mut self) -> Result<()> {
        if self.state > SourceState::None {
            return Ok(());
        }

        let available = self.manager.max_camera();
        if available == 0 {
            error!("no camera available");
            return Err(CameraError::NoCameras);
        }
        info!(available, "cameras found");

        self.shared
            .lock()
            .allocate(self.config.width, self.config.height)?;
        self.state = SourceState::Inited;
        Ok(())
    }

    /// Open and start the cameras selected by `mask` (bit `n` = channel `n`).
    ///
    /// Fails if the manager cannot supply a requested index; channels that
    /// started in the same call are shut down again. A channel whose driver
    /// fails to negotiate or start is left inactive and its quadrant stays
    /// zeroed; `open` still succeeds.
    pub fn open(&mut self, mask: u32) -> Result<()> {
        if self.state == SourceState::Opened {
            self.close();
        }
        self.init()?;

        if self.sim.is_some() {
            self.state = SourceState::Opened;
            return Ok(());
        }

        let requested = mask & ALL_CHANNELS;
        if requested != mask {
            warn!(mask, supported = MAX_CAMERAS, "ignoring unsupported channel bits");
        }

        let (epoch, width, height) = {
            let mut buffer = self.shared.lock();
            buffer.clear();
            (buffer.epoch(), buffer.width(), buffer.height())
        };
        let property = self.config.channel_property();

        for quadrant in Quadrant::ALL {
            let index = quadrant.index();
            if requested & (1 << index) == 0 {
                continue;
            }

            let Some(driver) = self.manager.camera_by_seq(index) else {
                error!(channel = index, "camera not available, aborting open");
                self.close_channels();
                return Err(CameraError::CameraUnavailable(index));
            };

            match Channel::bind(driver, quadrant, &property, &self.shared, (width, height), epoch)
            {
                Ok(channel) => {
                    if let Some(slot) = self.channels.get_mut(index) {
                        *slot = channel;
                    }
                }
                Err(err) => {
                    warn!(channel = index, %err, "channel left inactive");
                    self.shared.observer.channel_degraded(index, &err);
                }
            }
        }

        self.state = SourceState::Opened;
        info!(requested, active = self.active_mask(), "camera source opened");
        Ok(())
    }

    fn close_channels(&mut self) {
        for (index, channel) in self.channels.iter_mut().enumerate() {
            channel.unbind(index);
        }
    }

    /// Stop and close every active channel. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.close_channels();
        if self.state == SourceState::Opened {
            self.state = SourceState::Inited;
            debug!("camera source closed");
        }
    }

    /// Lock the composite for reading.
    ///
    /// Pull-based channels (and the simulation file) are refreshed first.
    /// Producers block until the returned guard is released, so hold it
    /// only as long as the read takes.
    pub fn get_frame_data(&mut self) -> Result<FrameGuard<'_>> {
        let mut buffer = self.shared.lock();
        if !buffer.is_allocated() {
            return Err(CameraError::NotInitialized);
        }

        if let Some(sim) = self.sim.as_mut() {
            if let Err(err) = sim.read_next(&mut buffer) {
                warn!(%err, "simulation frame read failed");
            }
        } else {
            for (index, channel) in self.channels.iter_mut().enumerate() {
                match channel.pull_into(index, &mut buffer) {
                    Ok(Some(sequence)) => self.shared.observer.frame_converted(index, sequence),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(channel = index, %err, "pull failed");
                        self.shared.observer.frame_dropped(index, &err);
                    }
                }
            }
        }

        self.shared.observer.frame_read();
        Ok(FrameGuard { buffer })
    }

    /// Release a guard returned by [`get_frame_data`](Self::get_frame_data).
    /// Equivalent to dropping it.
    pub fn release_frame_data(guard: FrameGuard<'_>) {
        drop(guard);
    }

    /// Serve pre-converted RGBA frames from `path` instead of live cameras.
    ///
    /// Frames are copied verbatim, so the file must store R, G, B, A bytes.
    /// On error the source is left exactly as it was.
    pub fn set_sim_file_rgba<P: AsRef<Path>>(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        path: P,
    ) -> Result<()> {
        self.set_sim_file(width, height, depth, path.as_ref(), SimFormat::Rgba)
    }

    /// Serve packed `Y V Y U` frames from `path`, converted on read.
    ///
    /// On error the source is left exactly as it was.
    pub fn set_sim_file_yuv<P: AsRef<Path>>(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        path: P,
    ) -> Result<()> {
        self.set_sim_file(width, height, depth, path.as_ref(), SimFormat::Yuv)
    }

    fn set_sim_file(
        &mut self,
        width: u32,
        height: u32,
        depth: u32,
        path: &Path,
        format: SimFormat,
    ) -> Result<()> {
        // Nothing is torn down until the file is known to be usable.
        let sim = match SimulationContext::open(path, width, height, depth, format) {
            Ok(sim) => sim,
            Err(err) => {
                error!(path = %path.display(), %err, "failed to open video simulation file");
                return Err(err);
            }
        };

        self.close();
        self.sim = None;
        self.shared.lock().allocate_frame(width, height);
        self.sim = Some(sim);
        self.state = SourceState::Inited;
        Ok(())
    }
}

impl<M: CameraManager> Drop for CameraSource<M> {
    fn drop(&mut self) {
        self.close();
        self.sim = None;
        self.shared.lock().release();
        debug!("camera source released");
    }
}

/// Locked view of the composite buffer.
///
/// Every producer is blocked while a guard is alive.
pub struct FrameGuard<'a> {
    buffer: MutexGuard<'a, CompositeBuffer>,
}

impl FrameGuard<'_> {
    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Release the lock.
    pub fn release(self) {}
}

impl Deref for FrameGuard<'_> {
    type Target = CompositeBuffer;

    fn deref(&self) -> &CompositeBuffer {
        &self.buffer
    }
}
