//! Random triangle soup
//!
//! Points are scattered through a 10-unit cube and consecutive triples form
//! triangles. Each frame the cloud rotates about Y, is viewed from z = 15 with a
//! 45 degree perspective, and is rasterized with a depth test.

use super::{Perspective, RenderContext, Renderer, Xorshift};

const CUBE_EXTENT: f32 = 10.0;
const CAMERA_DISTANCE: f32 = 15.0;
const FOV_Y_DEGREES: f32 = 45.0;
const NEAR_PLANE: f32 = 0.1;
const ROTATION_SPEED: f32 = 0.5;

pub struct TrianglesRenderer {
    rng: Xorshift,
    vertices: Vec<[f32; 3]>,
    indices: Vec<u32>,
    workload_size: u64,
}

impl TrianglesRenderer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xorshift::new(seed),
            vertices: Vec::new(),
            indices: Vec::new(),
            workload_size: 0,
        }
    }

    #[cfg(test)]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl Renderer for TrianglesRenderer {
    fn regenerate(&mut self, workload_size: u64) {
        let count = usize::try_from(workload_size).unwrap_or(usize::MAX);
        let rng = &mut self.rng;

        self.vertices.clear();
        self.vertices.extend((0..count).map(|_| {
            [
                (rng.next_f32() - 0.5) * CUBE_EXTENT,
                (rng.next_f32() - 0.5) * CUBE_EXTENT,
                (rng.next_f32() - 0.5) * CUBE_EXTENT,
            ]
        }));

        // Trailing points that do not complete a triangle are left unindexed.
        let index_limit = u32::try_from(count - count % 3).unwrap_or(u32::MAX - 2);
        self.indices.clear();
        self.indices.extend(0..index_limit);

        self.vertices.shrink_to_fit();
        self.indices.shrink_to_fit();
        self.workload_size = workload_size;
    }

    fn draw(&mut self, ctx: &mut RenderContext, time_secs: f32) {
        ctx.set_clear_color([0.1, 0.1, 0.1]);
        ctx.clear(true);

        let camera = Perspective::new(FOV_Y_DEGREES, ctx.aspect(), NEAR_PLANE);
        let (sin_r, cos_r) = (time_secs * ROTATION_SPEED).sin_cos();

        for tri in self.indices.chunks_exact(3) {
            let mut screen = [[0.0f32; 3]; 3];
            let mut color = [0.0f32; 3];
            let mut visible = true;

            for (corner, &index) in tri.iter().enumerate() {
                let [x, y, z] = self.vertices[index as usize];
                let rotated_x = x * cos_r + z * sin_r;
                let rotated_z = -x * sin_r + z * cos_r;
                let view = [rotated_x, y, rotated_z - CAMERA_DISTANCE];

                let Some((nx, ny, depth)) = camera.project(view) else {
                    visible = false;
                    break;
                };
                screen[corner] = [
                    (nx + 1.0) * 0.5 * (ctx.width() - 1) as f32,
                    (1.0 - ny) * 0.5 * (ctx.height() - 1) as f32,
                    depth,
                ];

                let shade = position_color([x, y, z]);
                for c in 0..3 {
                    color[c] += shade[c] / 3.0;
                }
            }

            if visible {
                rasterize(ctx, screen, color);
            }
        }
    }

    fn workload_size(&self) -> u64 {
        self.workload_size
    }
}

/// `normalize(p) * 0.5 + 0.5`
fn position_color(p: [f32; 3]) -> [f32; 3] {
    let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
    if len == 0.0 {
        return [0.5; 3];
    }
    [
        p[0] / len * 0.5 + 0.5,
        p[1] / len * 0.5 + 0.5,
        p[2] / len * 0.5 + 0.5,
    ]
}

fn edge(a: [f32; 3], b: [f32; 3], px: f32, py: f32) -> f32 {
    (b[0] - a[0]) * (py - a[1]) - (b[1] - a[1]) * (px - a[0])
}

/// Fill a screen-space triangle with interpolated depth.
fn rasterize(ctx: &mut RenderContext, v: [[f32; 3]; 3], rgb: [f32; 3]) {
    let area = edge(v[0], v[1], v[2][0], v[2][1]);
    if area == 0.0 || !area.is_finite() {
        return;
    }

    let max_x = (ctx.width() - 1) as f32;
    let max_y = (ctx.height() - 1) as f32;
    let min_px = v.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min).floor().clamp(0.0, max_x) as u32;
    let max_px = v.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max).ceil().clamp(0.0, max_x) as u32;
    let min_py = v.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min).floor().clamp(0.0, max_y) as u32;
    let max_py = v.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max).ceil().clamp(0.0, max_y) as u32;

    for py in min_py..=max_py {
        for px in min_px..=max_px {
            let (x, y) = (px as f32 + 0.5, py as f32 + 0.5);
            let w0 = edge(v[1], v[2], x, y) / area;
            let w1 = edge(v[2], v[0], x, y) / area;
            let w2 = edge(v[0], v[1], x, y) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let depth = w0 * v[0][2] + w1 * v[1][2] + w2 * v[2][2];
            ctx.write_depth_tested(px, py, depth, rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regenerate_groups_points_into_triangles() {
        let mut renderer = TrianglesRenderer::new(9);
        renderer.regenerate(10_000);
        assert_eq!(renderer.vertices.len(), 10_000);
        assert_eq!(renderer.triangle_count(), 3_333);
        assert!(renderer
            .vertices
            .iter()
            .flatten()
            .all(|c| (-5.0..5.0).contains(c)));
    }

    #[test]
    fn fewer_than_three_points_yield_no_triangles() {
        let mut renderer = TrianglesRenderer::new(9);
        renderer.regenerate(2);
        assert_eq!(renderer.triangle_count(), 0);
        let mut ctx = RenderContext::new(16, 16).unwrap();
        renderer.draw(&mut ctx, 0.0);
        assert_eq!(ctx.pixel(8, 8), Some([0.1, 0.1, 0.1]));
    }

    #[test]
    fn rasterize_fills_interior_only() {
        let mut ctx = RenderContext::new(32, 32).unwrap();
        ctx.clear(true);
        let tri = [[2.0, 2.0, 5.0], [30.0, 2.0, 5.0], [2.0, 30.0, 5.0]];
        rasterize(&mut ctx, tri, [1.0, 0.0, 0.0]);

        assert_eq!(ctx.pixel(4, 4), Some([1.0, 0.0, 0.0]));
        assert_eq!(ctx.pixel(29, 29), Some([0.0, 0.0, 0.0]));
    }

    #[test]
    fn position_color_is_in_unit_range() {
        let c = position_color([3.0, -4.0, 0.0]);
        assert!((c[0] - 0.8).abs() < 1e-6);
        assert!((c[1] - 0.1).abs() < 1e-6);
        assert_eq!(c[2], 0.5);
        assert_eq!(position_color([0.0; 3]), [0.5; 3]);
    }

    #[test]
    fn draw_covers_part_of_the_viewport() {
        let mut ctx = RenderContext::new(64, 48).unwrap();
        let mut renderer = TrianglesRenderer::new(5);
        renderer.regenerate(300);
        renderer.draw(&mut ctx, 1.0);

        let covered = (0..48)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|(x, y)| ctx.pixel(*x, *y) != Some([0.1, 0.1, 0.1]))
            .count();
        assert!(covered > 0);
    }
}
