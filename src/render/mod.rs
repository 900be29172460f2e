//! Compositing surface, per-frame compositor and the render loop.

mod compositor;
mod render_loop;
mod surface;

pub use compositor::{
    blend_over, composite, draw_grid, draw_overlay, grid_lines, overlay_affine, CompositeLayers,
    CompositeReport,
};
pub use render_loop::{
    FrameRequest, LoopState, LoopStats, RenderFn, RenderLoop, SkipReason, TickOutcome,
};
pub use surface::RasterSurface;
