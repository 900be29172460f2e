//! Unit tests for the compositor and render loop through the public API.

use ar_capture::camera::{Frame, FrameFormat, Resolution};
use ar_capture::overlay::OverlayImage;
use ar_capture::profile::GridSpec;
use ar_capture::render::{
    blend_over, composite, grid_lines, overlay_affine, CompositeLayers, RasterSurface,
    RenderLoop, SkipReason, TickOutcome,
};
use ar_capture::transform::OverlayTransform;
use image::{Rgba, RgbaImage};
use kurbo::Point;
use std::time::Instant;

fn gray_frame(w: u32, h: u32) -> Frame {
    Frame {
        data: vec![128; (w * h * 4) as usize],
        width: w,
        height: h,
        format: FrameFormat::Rgba,
        timestamp: Instant::now(),
    }
}

#[test]
fn test_affine_maps_overlay_center_to_position() {
    let mut transform = OverlayTransform::default();
    transform.set_position(25.0, 75.0);
    transform.set_rotation(33.0);
    transform.set_mirrored(true);

    let affine = overlay_affine(Resolution::new(200, 100), (40, 20), &transform, 0.5).unwrap();
    let center = affine * Point::new(20.0, 10.0);
    assert!((center.x - 50.0).abs() < 1e-9);
    assert!((center.y - 75.0).abs() < 1e-9);
}

#[test]
fn test_affine_reference_size() {
    // Longer overlay side spans half the shorter canvas side at 100%
    let transform = OverlayTransform::default();
    let affine = overlay_affine(Resolution::new(200, 100), (40, 20), &transform, 0.5).unwrap();
    let left = affine * Point::new(0.0, 10.0);
    let right = affine * Point::new(40.0, 10.0);
    assert!(((right.x - left.x) - 50.0).abs() < 1e-9);
}

#[test]
fn test_affine_rejects_degenerate_sizes() {
    let transform = OverlayTransform::default();
    assert!(overlay_affine(Resolution::new(0, 100), (4, 4), &transform, 0.5).is_none());
    assert!(overlay_affine(Resolution::new(100, 100), (0, 4), &transform, 0.5).is_none());
}

#[test]
fn test_transparent_overlay_pixels_leave_video() {
    // White 4x4 block in the top-left corner, transparent elsewhere
    let img = RgbaImage::from_fn(10, 10, |x, y| {
        if x < 4 && y < 4 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let overlay = OverlayImage::from_rgba(img).unwrap();

    let mut surface = RasterSurface::new();
    composite(
        &mut surface,
        &gray_frame(100, 100),
        &CompositeLayers {
            transform: OverlayTransform::default(),
            overlay: Some(&overlay),
            grid: None,
            base_fraction: 0.5,
        },
    );
    assert_eq!(surface.pixel(60, 60), Some([128, 128, 128, 255]));
    let block = surface.pixel(32, 32).unwrap();
    assert!(block.iter().all(|c| *c >= 252), "{:?}", block);
}

#[test]
fn test_grid_follows_frame_size() {
    let mut surface = RasterSurface::new();
    let layers = CompositeLayers {
        transform: OverlayTransform::default(),
        overlay: None,
        grid: Some(GridSpec { columns: 4, rows: 2 }),
        base_fraction: 0.5,
    };

    let report = composite(&mut surface, &gray_frame(40, 20), &layers);
    assert!(report.grid_drawn);
    for x in grid_lines(40, 4) {
        assert_ne!(surface.pixel(x, 3), Some([128, 128, 128, 255]));
    }
    assert_eq!(grid_lines(20, 2), vec![10]);

    let report = composite(&mut surface, &gray_frame(80, 40), &layers);
    assert!(report.resized);
    assert_eq!(surface.resolution(), Resolution::new(80, 40));
    assert_ne!(surface.pixel(20, 3), Some([128, 128, 128, 255]));
}

#[test]
fn test_blend_keeps_opaque_destination() {
    for opacity in [0.1, 0.5, 0.9] {
        let out = blend_over([10, 200, 30, 255], [250, 10, 90, 200], opacity);
        assert_eq!(out[3], 255);
    }
}

#[test]
fn test_render_loop_counts_draws_over_window() {
    let mut lp: RenderLoop<Vec<u32>> = RenderLoop::new();
    let mut frames = Vec::new();
    let mut n = 0;
    lp.start(Box::new(move |frames: &mut Vec<u32>| {
        n += 1;
        if n % 3 == 0 {
            return TickOutcome::Skipped(SkipReason::FrameNotReady);
        }
        frames.push(n);
        TickOutcome::Drawn
    }));
    // A second start must not add a second cadence
    lp.start(Box::new(|frames: &mut Vec<u32>| {
        frames.push(0);
        TickOutcome::Drawn
    }));

    for _ in 0..30 {
        lp.pump(&mut frames);
    }
    assert_eq!(frames.len(), 20);
    assert!(!frames.contains(&0));
    let stats = lp.stats();
    assert_eq!((stats.ticks, stats.drawn, stats.skipped), (30, 20, 10));
}
