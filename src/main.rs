//! Quad-cam binary: composite up to four cameras and read frames.

mod args;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use quad_cam_capture::traits::Result;
use quad_cam_capture::{
    CameraSource, FrameCounters, FrameObserver, SourceConfig, V4l2Manager, MAX_CAMERAS,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, SimLayout};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("quad_cam_capture=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!(%err, "quad-cam failed");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let manager = if args.sim_file.is_some() {
        V4l2Manager::new(Vec::new())
    } else if args.devices.is_empty() {
        V4l2Manager::discover()
    } else {
        V4l2Manager::new(args.devices.clone())
    }
    .with_buffer_count(args.buffers);

    let config = SourceConfig::default()
        .with_resolution(args.width, args.height)
        .with_fps(args.fps);
    let counters = Arc::new(FrameCounters::new());
    let observer: Arc<dyn FrameObserver> = Arc::clone(&counters);
    let mut source = CameraSource::with_config(manager, config, observer)?;

    if let Some(path) = &args.sim_file {
        match args.sim_layout {
            SimLayout::Rgba => source.set_sim_file_rgba(args.width, args.height, args.depth, path)?,
            SimLayout::Yuv => source.set_sim_file_yuv(args.width, args.height, args.depth, path)?,
        }
    }

    source.init()?;
    source.open(args.mask)?;
    info!(
        width = args.width,
        height = args.height,
        active = source.active_mask(),
        "capturing"
    );

    let mut output = args
        .output
        .as_ref()
        .map(File::create)
        .transpose()?
        .map(BufWriter::new);

    let interval = Duration::from_secs(1) / args.fps.max(1);
    let started = Instant::now();
    for _ in 0..args.frames {
        let tick = Instant::now();
        let frame = source.get_frame_data()?;
        if let Some(writer) = output.as_mut() {
            writer.write_all(frame.data())?;
        }
        frame.release();
        if let Some(remaining) = interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
    if let Some(writer) = output.as_mut() {
        writer.flush()?;
    }

    let elapsed = started.elapsed();
    source.close();
    info!(reads = counters.reads(), ?elapsed, "capture finished");
    for index in 0..MAX_CAMERAS {
        info!(
            channel = index,
            converted = counters.converted(index),
            dropped = counters.dropped(index),
            degraded = counters.degraded(index),
            "channel summary"
        );
    }
    Ok(())
}
