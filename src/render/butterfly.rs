//! Butterfly particle field
//!
//! Particles orbit along a figure-eight "butterfly" curve with a wing-beat
//! offset and are splatted as soft round points with additive blending. The
//! colour cycles through a fixed palette every two seconds.

use std::f32::consts::PI;

use super::{smoothstep, RenderContext, Renderer, Xorshift};

const BUTTERFLY_SCALE: f32 = 0.8;
const WING_SPEED: f32 = 3.0;
const COLOR_PERIOD_SECS: f32 = 2.0;

const PALETTE: [[f32; 4]; 8] = [
    [1.0, 0.0, 0.0, 1.0], // red
    [1.0, 0.5, 0.0, 1.0], // orange
    [1.0, 1.0, 0.0, 1.0], // yellow
    [0.0, 1.0, 0.0, 1.0], // green
    [0.0, 1.0, 1.0, 1.0], // cyan
    [0.0, 0.0, 1.0, 1.0], // blue
    [0.5, 0.0, 1.0, 1.0], // purple
    [1.0, 0.0, 1.0, 1.0], // magenta
];

#[derive(Debug, Clone, Copy)]
struct Particle {
    phase: f32,
    distance: f32,
    wing_pos: f32,
    size: f32,
}

pub struct ButterflyRenderer {
    rng: Xorshift,
    particles: Vec<Particle>,
    workload_size: u64,
}

impl ButterflyRenderer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xorshift::new(seed),
            particles: Vec::new(),
            workload_size: 0,
        }
    }

    #[cfg(test)]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }
}

impl Renderer for ButterflyRenderer {
    fn regenerate(&mut self, workload_size: u64) {
        let count = usize::try_from(workload_size).unwrap_or(usize::MAX);
        let rng = &mut self.rng;
        self.particles.clear();
        self.particles.extend((0..count).map(|_| Particle {
            distance: rng.next_f32() * 0.8,
            phase: rng.next_f32() * 2.0 * PI,
            wing_pos: rng.next_f32() * PI,
            size: 3.0 + rng.next_f32() * 2.0,
        }));
        self.particles.shrink_to_fit();
        self.workload_size = workload_size;
    }

    fn draw(&mut self, ctx: &mut RenderContext, time_secs: f32) {
        ctx.set_clear_color([0.0, 0.0, 0.0]);
        ctx.clear(false);

        let [r, g, b, a] = palette_color(time_secs);
        let rgb = [r, g, b];
        let wing = WING_SPEED * time_secs;

        for p in &self.particles {
            let t = p.phase + time_secs * 0.5;
            let (sin_t, cos_t) = t.sin_cos();
            let x = BUTTERFLY_SCALE * p.distance * sin_t + (wing + p.wing_pos).sin() * p.distance * 0.2;
            let y = BUTTERFLY_SCALE * p.distance * sin_t * cos_t;

            if let Some((cx, cy)) = ctx.ndc_to_pixel(x, y) {
                splat(ctx, cx, cy, p.size, rgb, a);
            }
        }
    }

    fn workload_size(&self) -> u64 {
        self.workload_size
    }
}

/// Palette colour at `time_secs`, interpolated towards the next entry.
fn palette_color(time_secs: f32) -> [f32; 4] {
    let cycle = (time_secs / COLOR_PERIOD_SECS).max(0.0);
    let index = cycle as usize % PALETTE.len();
    let next = (index + 1) % PALETTE.len();
    let t = cycle.fract();

    let from = PALETTE[index];
    let to = PALETTE[next];
    [
        from[0] + (to[0] - from[0]) * t,
        from[1] + (to[1] - from[1]) * t,
        from[2] + (to[2] - from[2]) * t,
        from[3] + (to[3] - from[3]) * t,
    ]
}

/// Soft round point of diameter `size` pixels.
fn splat(ctx: &mut RenderContext, cx: u32, cy: u32, size: f32, rgb: [f32; 3], alpha: f32) {
    let radius = size * 0.5;
    let reach = radius.ceil() as i64;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let dist = ((dx * dx + dy * dy) as f32).sqrt() / radius;
            let coverage = smoothstep(0.0, 1.0, 1.0 - dist);
            if coverage <= 0.0 {
                continue;
            }
            let x = cx as i64 + dx;
            let y = cy as i64 + dy;
            if x < 0 || y < 0 {
                continue;
            }
            ctx.blend_add(x as u32, y as u32, rgb, alpha * coverage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regenerate_resizes_particle_set() {
        let mut renderer = ButterflyRenderer::new(42);
        renderer.regenerate(8_000);
        assert_eq!(renderer.particle_count(), 8_000);
        renderer.regenerate(100);
        assert_eq!(renderer.particle_count(), 100);
        assert_eq!(renderer.workload_size(), 100);
    }

    #[test]
    fn particles_stay_on_the_disc() {
        let mut renderer = ButterflyRenderer::new(1);
        renderer.regenerate(2_000);
        assert!(renderer
            .particles
            .iter()
            .all(|p| (0.0..0.8).contains(&p.distance) && (3.0..5.0).contains(&p.size)));
    }

    #[test]
    fn palette_interpolates_between_entries() {
        assert_eq!(palette_color(0.0), PALETTE[0]);
        let halfway = palette_color(1.0);
        assert!((halfway[1] - 0.25).abs() < 1e-6);
        // Wraps after the last entry.
        assert_eq!(palette_color(16.0), PALETTE[0]);
    }

    #[test]
    fn draw_lights_up_pixels() {
        let mut ctx = RenderContext::new(64, 48).unwrap();
        let mut renderer = ButterflyRenderer::new(3);
        renderer.regenerate(500);
        renderer.draw(&mut ctx, 0.25);

        let lit = (0..48)
            .flat_map(|y| (0..64).map(move |x| (x, y)))
            .filter(|(x, y)| ctx.pixel(*x, *y).is_some_and(|px| px[0] > 0.0))
            .count();
        assert!(lit > 0);
    }
}
