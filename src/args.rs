//! Command-line arguments for the `quad-cam` binary.

use clap::Parser;
use std::path::PathBuf;

/// Layout of the frames stored in a simulation file.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Eq, Copy)]
pub enum SimLayout {
    /// Pre-converted RGBA8888 frames
    Rgba,
    /// Packed Y V Y U 4:2:2 frames
    Yuv,
}

/// Command-line arguments for the quad camera compositor.
///
/// Arguments can be specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Cameras on /dev/video0 and /dev/video2 into the top two quadrants
/// quad-cam --devices 0,2 --mask 3 --frames 100 --output composite.rgba
///
/// # Replay a recorded YUV file instead of live cameras
/// export SIM_FILE=capture.yuv
/// quad-cam --sim-layout yuv --depth 2
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video node indices feeding channels 0..3, in order. Scans /dev when empty.
    #[arg(short, long, env = "DEVICES", value_delimiter = ',')]
    pub devices: Vec<u32>,

    /// Channel selection mask (bit n enables channel n)
    #[arg(short, long, env = "MASK", default_value = "15")]
    pub mask: u32,

    /// Composite width in pixels
    #[arg(long, env = "WIDTH", default_value = "1280")]
    pub width: u32,

    /// Composite height in pixels
    #[arg(long, env = "HEIGHT", default_value = "720")]
    pub height: u32,

    /// Requested capture frame rate
    #[arg(long, env = "FPS", default_value = "30")]
    pub fps: u32,

    /// Number of mmap buffers per camera stream
    #[arg(long, env = "BUFFERS", default_value = "4")]
    pub buffers: u32,

    /// Composite frames to read before exiting
    #[arg(short = 'n', long, env = "FRAMES", default_value = "300")]
    pub frames: u64,

    /// Simulation file to replay instead of opening cameras
    #[arg(long, env = "SIM_FILE")]
    pub sim_file: Option<PathBuf>,

    /// Frame layout of the simulation file
    #[arg(long, env = "SIM_LAYOUT", default_value = "rgba", value_enum)]
    pub sim_layout: SimLayout,

    /// Bytes per pixel in the simulation file
    #[arg(long, env = "DEPTH", default_value = "4")]
    pub depth: u32,

    /// Append every composite frame as raw RGBA to this file
    #[arg(short, long, env = "OUTPUT")]
    pub output: Option<PathBuf>,
}
