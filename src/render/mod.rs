//! Render module
//!
//! Each test owns a [`RenderContext`] (framebuffer, depth buffer, viewport) and
//! a [`Renderer`] that holds the workload data for the active stage. The
//! shipped backend rasterizes on the CPU, so frame cost scales directly with
//! the workload size.

mod butterfly;
mod ocean;
mod triangles;

use std::hint::black_box;

pub use butterfly::ButterflyRenderer;
pub use ocean::OceanRenderer;
pub use triangles::TrianglesRenderer;

use crate::config::TestKind;
use crate::error::RenderSetupError;

/// Largest accepted viewport edge in pixels.
pub const MAX_VIEWPORT_EDGE: u32 = 16_384;

/// Workload generation and drawing for one test.
pub trait Renderer {
    /// Rebuild the workload data set for `workload_size`. Expensive; called once
    /// before the first frame and once per stage transition.
    fn regenerate(&mut self, workload_size: u64);

    /// Draw one frame at animation time `time_secs`.
    fn draw(&mut self, ctx: &mut RenderContext, time_secs: f32);

    /// Size the current data set was generated for.
    fn workload_size(&self) -> u64;
}

/// Renderer for `kind` with a deterministic data seed.
pub fn create_renderer(kind: TestKind, seed: u64) -> Box<dyn Renderer> {
    match kind {
        TestKind::Butterfly => Box::new(ButterflyRenderer::new(seed)),
        TestKind::Triangles => Box::new(TrianglesRenderer::new(seed)),
        TestKind::Ocean => Box::new(OceanRenderer::new()),
    }
}

/// Owned render target state passed into every draw call.
#[derive(Debug)]
pub struct RenderContext {
    width: u32,
    height: u32,
    color: Vec<[f32; 3]>,
    depth: Vec<f32>,
    clear_color: [f32; 3],
}

impl RenderContext {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderSetupError> {
        if width == 0 || height == 0 || width > MAX_VIEWPORT_EDGE || height > MAX_VIEWPORT_EDGE {
            return Err(RenderSetupError::InvalidViewport { width, height });
        }

        let pixels = width as usize * height as usize;
        let mut color = Vec::new();
        color
            .try_reserve_exact(pixels)
            .map_err(|_| RenderSetupError::FramebufferAllocation {
                bytes: pixels * std::mem::size_of::<[f32; 3]>(),
            })?;
        color.resize(pixels, [0.0; 3]);

        let mut depth = Vec::new();
        depth
            .try_reserve_exact(pixels)
            .map_err(|_| RenderSetupError::FramebufferAllocation {
                bytes: pixels * std::mem::size_of::<f32>(),
            })?;
        depth.resize(pixels, f32::INFINITY);

        Ok(Self {
            width,
            height,
            color,
            depth,
            clear_color: [0.0; 3],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn set_clear_color(&mut self, rgb: [f32; 3]) {
        self.clear_color = rgb;
    }

    pub fn clear(&mut self, with_depth: bool) {
        let clear = self.clear_color;
        self.color.fill(clear);
        if with_depth {
            self.depth.fill(f32::INFINITY);
        }
    }

    /// Map normalized device coordinates to a pixel, `None` when off-screen.
    pub fn ndc_to_pixel(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        if !(-1.0..=1.0).contains(&x) || !(-1.0..=1.0).contains(&y) {
            return None;
        }
        let px = ((x + 1.0) * 0.5 * (self.width - 1) as f32).round() as u32;
        let py = ((1.0 - y) * 0.5 * (self.height - 1) as f32).round() as u32;
        Some((px, py))
    }

    /// Additive blend, as with `SRC_ALPHA, ONE`.
    pub fn blend_add(&mut self, x: u32, y: u32, rgb: [f32; 3], alpha: f32) {
        if let Some(idx) = self.index(x, y) {
            let px = &mut self.color[idx];
            px[0] += rgb[0] * alpha;
            px[1] += rgb[1] * alpha;
            px[2] += rgb[2] * alpha;
        }
    }

    /// Write `rgb` if `depth` is nearer than the stored value.
    pub fn write_depth_tested(&mut self, x: u32, y: u32, depth: f32, rgb: [f32; 3]) -> bool {
        match self.index(x, y) {
            Some(idx) if depth < self.depth[idx] => {
                self.depth[idx] = depth;
                self.color[idx] = rgb;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        self.index(x, y).map(|idx| self.color[idx])
    }

    /// Finish the frame. Reads the framebuffer back so the work cannot be
    /// optimized away and returns a cheap checksum of it.
    pub fn present(&self) -> f32 {
        let checksum: f32 = self
            .color
            .iter()
            .step_by(97)
            .map(|px| px[0] + px[1] + px[2])
            .sum();
        black_box(checksum)
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }
}

/// Perspective camera looking down -Z, matching a 45 degree field of view.
#[derive(Debug, Clone, Copy)]
pub struct Perspective {
    focal: f32,
    aspect: f32,
    near: f32,
}

impl Perspective {
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32) -> Self {
        let focal = 1.0 / (fov_y_degrees.to_radians() * 0.5).tan();
        Self {
            focal,
            aspect,
            near,
        }
    }

    /// Project a view-space point to `(ndc_x, ndc_y, depth)`; `None` behind the
    /// near plane.
    pub fn project(&self, view: [f32; 3]) -> Option<(f32, f32, f32)> {
        let distance = -view[2];
        if distance <= self.near {
            return None;
        }
        let x = self.focal / self.aspect * view[0] / distance;
        let y = self.focal * view[1] / distance;
        Some((x, y, distance))
    }
}

/// xorshift64* generator for reproducible workload data.
#[derive(Debug, Clone)]
pub struct Xorshift {
    state: u64,
}

impl Xorshift {
    pub fn new(seed: u64) -> Self {
        let state = seed ^ 0x9e37_79b9_7f4a_7c15;
        // Zero is a fixed point of xorshift.
        Self {
            state: if state == 0 { 0x2545_f491_4f6c_dd1d } else { state },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_viewport_is_setup_error() {
        let err = RenderContext::new(0, 768).unwrap_err();
        assert!(matches!(
            err,
            RenderSetupError::InvalidViewport {
                width: 0,
                height: 768
            }
        ));
        assert!(RenderContext::new(1024, MAX_VIEWPORT_EDGE + 1).is_err());
    }

    #[test]
    fn ndc_corners_map_to_pixel_corners() {
        let ctx = RenderContext::new(64, 32).unwrap();
        assert_eq!(ctx.ndc_to_pixel(-1.0, 1.0), Some((0, 0)));
        assert_eq!(ctx.ndc_to_pixel(1.0, -1.0), Some((63, 31)));
        assert_eq!(ctx.ndc_to_pixel(1.2, 0.0), None);
    }

    #[test]
    fn depth_test_keeps_nearest() {
        let mut ctx = RenderContext::new(4, 4).unwrap();
        assert!(ctx.write_depth_tested(1, 1, 5.0, [1.0, 0.0, 0.0]));
        assert!(!ctx.write_depth_tested(1, 1, 7.0, [0.0, 1.0, 0.0]));
        assert!(ctx.write_depth_tested(1, 1, 2.0, [0.0, 0.0, 1.0]));
        assert_eq!(ctx.pixel(1, 1), Some([0.0, 0.0, 1.0]));

        ctx.clear(true);
        assert!(ctx.write_depth_tested(1, 1, 7.0, [0.0, 1.0, 0.0]));
    }

    #[test]
    fn additive_blend_accumulates() {
        let mut ctx = RenderContext::new(2, 2).unwrap();
        ctx.blend_add(0, 0, [1.0, 0.5, 0.0], 0.5);
        ctx.blend_add(0, 0, [1.0, 0.5, 0.0], 0.5);
        assert_eq!(ctx.pixel(0, 0), Some([1.0, 0.5, 0.0]));
        ctx.blend_add(9, 9, [1.0, 1.0, 1.0], 1.0);
    }

    #[test]
    fn present_reads_back_the_framebuffer() {
        let mut ctx = RenderContext::new(8, 8).unwrap();
        assert_eq!(ctx.present(), 0.0);

        // 64 pixels: only the first falls on the 97-pixel sampling stride.
        ctx.set_clear_color([0.1, 0.2, 0.3]);
        ctx.clear(false);
        assert!((ctx.present() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn xorshift_is_reproducible_and_in_range() {
        let mut a = Xorshift::new(7);
        let mut b = Xorshift::new(7);
        for _ in 0..1_000 {
            let value = a.next_f32();
            assert_eq!(value, b.next_f32());
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn perspective_rejects_points_behind_camera() {
        let camera = Perspective::new(45.0, 1.0, 0.1);
        assert!(camera.project([0.0, 0.0, 1.0]).is_none());
        let (x, y, depth) = camera.project([0.0, 0.0, -10.0]).unwrap();
        assert_eq!((x, y), (0.0, 0.0));
        assert_eq!(depth, 10.0);
    }

    #[test]
    fn factory_builds_each_test_renderer() {
        for kind in TestKind::ALL {
            let mut renderer = create_renderer(kind, 1);
            renderer.regenerate(3);
            assert_eq!(renderer.workload_size(), 3);
        }
    }
}
