//! Per-frame compositing: video, then guide grid, then overlay.

use kurbo::{Affine, Rect};

use crate::camera::{Frame, Resolution};
use crate::overlay::OverlayImage;
use crate::profile::GridSpec;
use crate::transform::OverlayTransform;

use super::surface::RasterSurface;

/// Guide lines: white at 60% alpha.
const GRID_COLOR: [u8; 4] = [255, 255, 255, 153];

/// Inputs for one composite, captured at the start of the tick.
#[derive(Debug, Clone, Copy)]
pub struct CompositeLayers<'a> {
    pub transform: OverlayTransform,
    pub overlay: Option<&'a OverlayImage>,
    pub grid: Option<GridSpec>,
    pub base_fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompositeReport {
    pub resized: bool,
    pub grid_drawn: bool,
    pub overlay_drawn: bool,
}

/// Draw `frame` and the layers on top of it, in that fixed order.
pub fn composite(
    surface: &mut RasterSurface,
    frame: &Frame,
    layers: &CompositeLayers<'_>,
) -> CompositeReport {
    let resized = surface.ensure_size(frame.resolution());
    if resized {
        log::debug!("Surface resized to {}", frame.resolution());
    }

    surface.draw_frame(frame);

    let grid_drawn = match layers.grid {
        Some(grid) => draw_grid(surface, grid),
        None => false,
    };

    let overlay_drawn = match layers.overlay {
        Some(overlay) => draw_overlay(surface, overlay, &layers.transform, layers.base_fraction),
        None => false,
    };

    surface.mark_complete();
    CompositeReport {
        resized,
        grid_drawn,
        overlay_drawn,
    }
}

/// Draw `columns - 1` vertical and `rows - 1` horizontal guide lines at
/// proportional positions. Cell counts are capped at
/// [`GridSpec::MAX_CELLS`].
pub fn draw_grid(surface: &mut RasterSurface, grid: GridSpec) -> bool {
    let grid = grid.clamped();
    let Resolution { width, height } = surface.resolution();
    if width == 0 || height == 0 || (grid.columns < 2 && grid.rows < 2) {
        return false;
    }
    let thickness = (width.min(height) / 360).max(1);

    for line in grid_lines(width, grid.columns) {
        for x in line..(line + thickness).min(width) {
            for y in 0..height {
                blend_into(surface, x, y, GRID_COLOR, 1.0);
            }
        }
    }
    for line in grid_lines(height, grid.rows) {
        for y in line..(line + thickness).min(height) {
            for x in 0..width {
                blend_into(surface, x, y, GRID_COLOR, 1.0);
            }
        }
    }
    true
}

/// Pixel offsets of the interior dividers of `extent` split into `cells`.
pub fn grid_lines(extent: u32, cells: u32) -> Vec<u32> {
    if cells < 2 || extent == 0 {
        return Vec::new();
    }
    (1..cells)
        .map(|i| ((u64::from(extent) * u64::from(i)) / u64::from(cells)) as u32)
        .map(|x| x.min(extent - 1))
        .collect()
}

/// Mapping from overlay pixel space to canvas pixel space.
///
/// The overlay's longer side spans `base_fraction` of the canvas' shorter
/// side at 100% scale. The overlay is centered on the position point,
/// rotated, then mirrored about its own vertical axis.
pub fn overlay_affine(
    canvas: Resolution,
    overlay_size: (u32, u32),
    transform: &OverlayTransform,
    base_fraction: f32,
) -> Option<Affine> {
    let (ow, oh) = (f64::from(overlay_size.0), f64::from(overlay_size.1));
    if canvas.is_empty() || ow <= 0.0 || oh <= 0.0 {
        return None;
    }
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));

    let reference = f64::from(base_fraction) * cw.min(ch);
    let k = reference / ow.max(oh) * transform.scale_factor();
    if !k.is_finite() || k <= 0.0 {
        return None;
    }

    let cx = cw * f64::from(transform.position_x()) / 100.0;
    let cy = ch * f64::from(transform.position_y()) / 100.0;
    let flip = if transform.mirrored() { -1.0 } else { 1.0 };

    Some(
        Affine::translate((cx, cy))
            * Affine::rotate(transform.rotation_radians())
            * Affine::scale_non_uniform(flip * k, k)
            * Affine::translate((-ow / 2.0, -oh / 2.0)),
    )
}

/// Draw the overlay with its transform and opacity.
///
/// The overlay is rasterized with filtered sampling and anti-aliased edges
/// into a scratch layer covering its clipped bounding box, then composited
/// onto the surface. Returns `false` without touching the surface when
/// there is nothing to draw (fully transparent, degenerate transform, or
/// off-canvas).
pub fn draw_overlay(
    surface: &mut RasterSurface,
    overlay: &OverlayImage,
    transform: &OverlayTransform,
    base_fraction: f32,
) -> bool {
    let alpha = transform.alpha();
    if alpha <= 0.0 {
        return false;
    }
    let canvas = surface.resolution();
    let Some(affine) = overlay_affine(
        canvas,
        (overlay.width(), overlay.height()),
        transform,
        base_fraction,
    ) else {
        return false;
    };

    let (ow, oh) = (f64::from(overlay.width()), f64::from(overlay.height()));
    let bbox = affine.transform_rect_bbox(Rect::new(0.0, 0.0, ow, oh));
    let x0 = bbox.x0.floor().max(0.0) as u32;
    let y0 = bbox.y0.floor().max(0.0) as u32;
    let x1 = bbox.x1.ceil().min(f64::from(canvas.width)).max(0.0) as u32;
    let y1 = bbox.y1.ceil().min(f64::from(canvas.height)).max(0.0) as u32;
    if x0 >= x1 || y0 >= y1 {
        return false;
    }
    let (Ok(lw), Ok(lh)) = (u16::try_from(x1 - x0), u16::try_from(y1 - y0)) else {
        log::warn!("Overlay layer {}x{} is too large to rasterize", x1 - x0, y1 - y0);
        return false;
    };

    // Layer space has its origin at the top-left of the clipped bbox
    let local = Affine::translate((-f64::from(x0), -f64::from(y0))) * affine;
    let mut ctx = vello_cpu::RenderContext::new(lw, lh);
    ctx.set_transform(affine_to_cpu(local));
    ctx.set_paint(overlay.paint().clone());
    if alpha < 1.0 {
        ctx.push_opacity_layer(alpha);
    }
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, ow, oh));
    if alpha < 1.0 {
        ctx.pop_layer();
    }
    ctx.flush();
    let mut layer = vello_cpu::Pixmap::new(lw, lh);
    ctx.render_to_pixmap(&mut layer);

    let row = usize::from(lw);
    let mut painted = false;
    for (i, px) in layer.data_as_u8_slice().chunks_exact(4).enumerate() {
        if px[3] == 0 {
            continue;
        }
        let x = x0 + (i % row) as u32;
        let y = y0 + (i / row) as u32;
        let dst = surface.pixel_mut(x, y);
        *dst = premul_over(*dst, [px[0], px[1], px[2], px[3]]);
        painted = true;
    }
    painted
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn blend_into(surface: &mut RasterSurface, x: u32, y: u32, src: [u8; 4], opacity: f32) {
    let dst = surface.pixel_mut(x, y);
    *dst = blend_over(*dst, src, opacity);
}

/// Source-over blend of a straight-alpha `src` onto `dst`, with `opacity`
/// applied as global alpha.
pub fn blend_over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), sa);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = (sc + dc).min(255) as u8;
    }
    out[3] = (sa + mul_div255(u16::from(dst[3]), inv)).min(255) as u8;
    out
}

/// Source-over of a premultiplied `src` onto a straight-alpha `dst`.
fn premul_over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let da = u16::from(dst[3]);
    let out_a = (sa + mul_div255(da, inv)).min(255);

    let mut out = [0u8; 4];
    for i in 0..3 {
        let dc = mul_div255(mul_div255(u16::from(dst[i]), da), inv);
        let c = (u16::from(src[i]) + dc).min(out_a);
        out[i] = ((u32::from(c) * 255 + u32::from(out_a) / 2) / u32::from(out_a)) as u8;
    }
    out[3] = out_a as u8;
    out
}

fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}
