//! Simulation-file playback through the public API.
//!
//! No camera hardware is touched: the source is configured with an empty
//! device list and fed from temporary raw files.

use quad_cam_capture::traits::CameraError;
use quad_cam_capture::validation::{validate_solid, validate_uniform};
use quad_cam_capture::{CameraSource, Quadrant, Rect, SourceState, V4l2Manager};
use std::io::Write;
use tempfile::NamedTempFile;

const WIDTH: u32 = 16;
const HEIGHT: u32 = 8;

fn raw_file(frames: &[Vec<u8>]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile failed");
    for frame in frames {
        file.write_all(frame).expect("write failed");
    }
    file.flush().expect("flush failed");
    file
}

fn full() -> Rect {
    Rect {
        x: 0,
        y: 0,
        width: WIDTH,
        height: HEIGHT,
    }
}

#[test]
fn test_rgba_playback_cycles_frames() {
    let pixels = (WIDTH * HEIGHT) as usize;
    let red = [255u8, 0, 0, 255].repeat(pixels);
    let blue = [0u8, 0, 255, 255].repeat(pixels);
    let file = raw_file(&[red, blue]);

    let mut source = CameraSource::new(V4l2Manager::new(Vec::new()));
    source
        .set_sim_file_rgba(WIDTH, HEIGHT, 4, file.path())
        .expect("Failed to configure simulation");
    assert_eq!(source.state(), SourceState::Inited);
    source.init().expect("init should succeed without cameras");
    source.open(0b1111).expect("open should succeed without cameras");
    assert_eq!(source.active_mask(), 0, "No live channel may start");

    for expected in [[255, 0, 0], [0, 0, 255], [255, 0, 0]] {
        let frame = source.get_frame_data().expect("read failed");
        assert_eq!(frame.width(), WIDTH);
        assert_eq!(frame.height(), HEIGHT);
        validate_solid(frame.data(), frame.stride(), &full(), expected, 0)
            .expect("frame content mismatch");
        frame.release();
    }
}

#[test]
fn test_yuv_playback_converts_each_quadrant() {
    // Packed Y V Y U rows: left half black, right half white.
    let row: Vec<u8> = [16u8, 128, 16, 128]
        .repeat(WIDTH as usize / 4)
        .into_iter()
        .chain([235u8, 128, 235, 128].repeat(WIDTH as usize / 4))
        .collect();
    let file = raw_file(&[row.repeat(HEIGHT as usize)]);

    let mut source = CameraSource::new(V4l2Manager::new(Vec::new()));
    source
        .set_sim_file_yuv(WIDTH, HEIGHT, 2, file.path())
        .expect("Failed to configure simulation");
    source.open(0b0001).expect("open failed");

    let frame = source.get_frame_data().expect("read failed");
    let (data, stride) = (frame.data(), frame.stride());
    for quadrant in [Quadrant::TopLeft, Quadrant::BottomLeft] {
        let pixel = validate_uniform(data, stride, &quadrant.rect(WIDTH, HEIGHT))
            .expect("left quadrants should be uniform");
        assert_eq!(pixel, [0, 0, 0, 255], "{quadrant:?}");
    }
    for quadrant in [Quadrant::TopRight, Quadrant::BottomRight] {
        let pixel = validate_uniform(data, stride, &quadrant.rect(WIDTH, HEIGHT))
            .expect("right quadrants should be uniform");
        assert_eq!(pixel, [255, 255, 255, 255], "{quadrant:?}");
    }
}

#[test]
fn test_short_file_leaves_source_unconfigured() {
    let file = raw_file(&[vec![0u8; 10]]);

    let mut source = CameraSource::new(V4l2Manager::new(Vec::new()));
    let result = source.set_sim_file_rgba(WIDTH, HEIGHT, 4, file.path());
    assert!(
        matches!(result, Err(CameraError::BufferTooSmall { .. })),
        "Expected BufferTooSmall, got {result:?}"
    );
    assert_eq!(source.state(), SourceState::None);
    assert!(source.simulation().is_none());

    // Falls back to live cameras, of which there are none.
    assert!(matches!(source.init(), Err(CameraError::NoCameras)));
    assert!(matches!(
        source.get_frame_data().map(|frame| frame.data().len()),
        Err(CameraError::NotInitialized)
    ));
}
