//! Ocean height field
//!
//! A square grid of `32 * 2^detail` vertices per side is displaced every frame
//! by a sum of directional sine waves, viewed from above at a shallow angle and
//! drawn as depth-tested points shaded by wave height.

use super::{Perspective, RenderContext, Renderer};
use crate::config::MAX_OCEAN_DETAIL;

const BASE_GRID_SIDE: usize = 32;
const PLANE_EXTENT: f32 = 20.0;
const EYE: [f32; 3] = [0.0, 6.0, 14.0];
const PITCH_DEGREES: f32 = 25.0;

struct Wave {
    direction: [f32; 2],
    amplitude: f32,
    wavelength: f32,
    speed: f32,
}

const WAVES: [Wave; 4] = [
    Wave {
        direction: [1.0, 0.0],
        amplitude: 0.45,
        wavelength: 8.0,
        speed: 1.2,
    },
    Wave {
        direction: [0.6, 0.8],
        amplitude: 0.25,
        wavelength: 4.5,
        speed: 1.7,
    },
    Wave {
        direction: [-0.7, 0.71],
        amplitude: 0.12,
        wavelength: 2.2,
        speed: 2.4,
    },
    Wave {
        direction: [0.2, -0.98],
        amplitude: 0.06,
        wavelength: 1.1,
        speed: 3.1,
    },
];

const MAX_HEIGHT: f32 = 0.45 + 0.25 + 0.12 + 0.06;

pub struct OceanRenderer {
    grid: Vec<[f32; 2]>,
    workload_size: u64,
}

impl OceanRenderer {
    pub fn new() -> Self {
        Self {
            grid: Vec::new(),
            workload_size: 0,
        }
    }

    /// Configuration rejects details above `MAX_OCEAN_DETAIL`; the clamp only
    /// keeps the shift in range for direct callers.
    pub fn grid_side(detail: u64) -> usize {
        BASE_GRID_SIDE << detail.min(MAX_OCEAN_DETAIL)
    }

    #[cfg(test)]
    pub fn vertex_count(&self) -> usize {
        self.grid.len()
    }
}

impl Default for OceanRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for OceanRenderer {
    fn regenerate(&mut self, workload_size: u64) {
        let side = Self::grid_side(workload_size);
        let step = PLANE_EXTENT / (side - 1) as f32;
        let half = PLANE_EXTENT * 0.5;

        self.grid.clear();
        self.grid.reserve_exact(side * side);
        for row in 0..side {
            for col in 0..side {
                self.grid
                    .push([col as f32 * step - half, row as f32 * step - half]);
            }
        }
        self.workload_size = workload_size;
    }

    fn draw(&mut self, ctx: &mut RenderContext, time_secs: f32) {
        ctx.set_clear_color([0.02, 0.05, 0.12]);
        ctx.clear(true);

        let camera = Perspective::new(45.0, ctx.aspect(), 0.1);
        let (sin_p, cos_p) = PITCH_DEGREES.to_radians().sin_cos();

        for &[x, z] in &self.grid {
            let height = wave_height(x, z, time_secs);

            let rel = [x - EYE[0], height - EYE[1], z - EYE[2]];
            // Tilt the camera down by the pitch angle.
            let view = [
                rel[0],
                rel[1] * cos_p + rel[2] * sin_p,
                -rel[1] * sin_p + rel[2] * cos_p,
            ];

            let Some((nx, ny, depth)) = camera.project(view) else {
                continue;
            };
            if let Some((px, py)) = ctx.ndc_to_pixel(nx, ny) {
                ctx.write_depth_tested(px, py, depth, water_color(height));
            }
        }
    }

    fn workload_size(&self) -> u64 {
        self.workload_size
    }
}

pub(crate) fn wave_height(x: f32, z: f32, time_secs: f32) -> f32 {
    WAVES
        .iter()
        .map(|w| {
            let k = std::f32::consts::TAU / w.wavelength;
            let along = w.direction[0] * x + w.direction[1] * z;
            w.amplitude * (k * along + time_secs * w.speed).sin()
        })
        .sum()
}

/// Deep blue in troughs, pale foam on crests.
fn water_color(height: f32) -> [f32; 3] {
    let t = ((height / MAX_HEIGHT) * 0.5 + 0.5).clamp(0.0, 1.0);
    let deep = [0.0, 0.15, 0.35];
    let foam = [0.8, 0.9, 1.0];
    [
        deep[0] + (foam[0] - deep[0]) * t,
        deep[1] + (foam[1] - deep[1]) * t,
        deep[2] + (foam[2] - deep[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_doubles_per_detail_level() {
        assert_eq!(OceanRenderer::grid_side(1), 64);
        assert_eq!(OceanRenderer::grid_side(6), 2048);
        assert_eq!(OceanRenderer::grid_side(99), 32 << MAX_OCEAN_DETAIL);

        let mut renderer = OceanRenderer::new();
        renderer.regenerate(2);
        assert_eq!(renderer.vertex_count(), 128 * 128);
    }

    #[test]
    fn wave_height_is_bounded() {
        for i in 0..500 {
            let t = i as f32 * 0.037;
            let h = wave_height(i as f32 * 0.13 - 10.0, 10.0 - i as f32 * 0.07, t);
            assert!(h.abs() <= MAX_HEIGHT + 1e-5);
        }
    }

    #[test]
    fn water_color_runs_from_deep_to_foam() {
        assert_eq!(water_color(-MAX_HEIGHT), [0.0, 0.15, 0.35]);
        let crest = water_color(MAX_HEIGHT);
        for (got, want) in crest.iter().zip([0.8f32, 0.9, 1.0]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn draw_puts_water_on_screen() {
        let mut ctx = RenderContext::new(80, 60).unwrap();
        let mut renderer = OceanRenderer::new();
        renderer.regenerate(1);
        renderer.draw(&mut ctx, 0.5);

        let water = (0..60)
            .flat_map(|y| (0..80).map(move |x| (x, y)))
            .filter(|(x, y)| ctx.pixel(*x, *y) != Some([0.02, 0.05, 0.12]))
            .count();
        assert!(water > 0);
    }
}
