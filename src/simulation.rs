use crate::config::Config;
use crate::field::Wavefield;
use crate::grid::Grid;
use crate::materials::{MaterialError, Materials};
use image::RgbImage;
use ndarray::Zip;
use tracing::warn;

/// Continuous-wave point source, repositionable between ticks.
#[derive(Clone, Debug)]
pub struct Source {
    pub x: usize,
    pub y: usize,
    pub amplitude: f64,
    pub frequency: f64,
    pub omega: f64,
}

impl Source {
    pub fn new(x: usize, y: usize, amplitude: f64, frequency: f64, omega: f64) -> Self {
        Self {
            x,
            y,
            amplitude,
            frequency,
            omega,
        }
    }

    pub fn waveform(&self, t: f64) -> f64 {
        self.amplitude * (self.frequency * self.omega * t).sin()
    }
}

pub struct SimulationParams {
    pub wave_speed: f64, // v
    pub dt: f64,         // Time step (fixed, one tick per display frame)
}

impl SimulationParams {
    /// Courant coefficient (v * dt / dx)^2 for the given spacing.
    pub fn courant(&self, dx: f64) -> f64 {
        (self.wave_speed * self.dt / dx).powi(2)
    }

    /// The scheme is stable for courant <= 1.
    pub fn is_stable(&self, dx: f64) -> bool {
        self.courant(dx) <= 1.0
    }
}

/// All mutable simulation state: the three field buffers, the material
/// grid, the source descriptor and the clock. One instance is owned by the
/// host loop and advanced one tick per frame.
pub struct Simulation {
    pub grid: Grid,
    pub field: Wavefield,
    materials: Materials,
    source: Source,
    params: SimulationParams,
    courant: f64,
    t: f64,
}

impl Simulation {
    pub fn new(half_width: usize, params: SimulationParams, source: Source) -> Self {
        let grid = Grid::new(half_width);
        if !params.is_stable(grid.dx) {
            warn!(
                courant = params.courant(grid.dx),
                "Courant coefficient exceeds 1, scheme will be unstable"
            );
        }

        let field = Wavefield::new(grid.l);
        let materials = Materials::default_barrier(grid.l);
        let courant = params.courant(grid.dx);

        let mut sim = Self {
            grid,
            field,
            materials,
            source,
            params,
            courant,
            t: 0.0,
        };
        // The stored descriptor is always interior
        let (x, y) = (sim.source.x, sim.source.y);
        sim.set_source_position(x, y);
        sim
    }

    pub fn from_config(config: &Config) -> Self {
        let params = SimulationParams {
            wave_speed: config.physics.wave_speed,
            dt: config.physics.dt,
        };
        let source = Source::new(
            config.source.x,
            config.source.y,
            config.source.amplitude,
            config.source.frequency,
            config.source.omega,
        );
        Self::new(config.grid.half_width, params, source)
    }

    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn courant(&self) -> f64 {
        self.courant
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn materials(&self) -> &Materials {
        &self.materials
    }

    /// Advance the field by one tick, parallelizing the interior pass.
    pub fn step(&mut self) {
        // 1. Write the source cell
        self.drive_source();

        // 2. Interior leapfrog update
        self.update_interior();

        // 3. Mirror the edges onto the freshly computed interior
        self.mirror_edges();

        // 4. Rotate buffers and advance the clock
        self.field.rotate();
        self.t += self.params.dt;
    }

    /// Single-threaded tick, bit-identical to [`step`](Self::step).
    pub fn step_serial(&mut self) {
        self.drive_source();
        self.update_interior_serial();
        self.mirror_edges();
        self.field.rotate();
        self.t += self.params.dt;
    }

    fn drive_source(&mut self) {
        self.field.current[[self.source.x, self.source.y]] = self.source.waveform(self.t);
    }

    fn update_interior(&mut self) {
        let c = self.courant;
        let l = self.grid.l;
        let field = &mut self.field;
        let u = &field.current;
        let u_prev = &field.previous;

        // Every interior cell reads only current/previous, so the pass is
        // order-independent. Edge cells are skipped and overwritten by the
        // mirror pass.
        Zip::indexed(&mut field.next).par_for_each(|(x, y), next| {
            if x == 0 || y == 0 || x == l - 1 || y == l - 1 {
                return;
            }
            let laplacian =
                u[[x - 1, y]] + u[[x + 1, y]] + u[[x, y - 1]] + u[[x, y + 1]] - 4.0 * u[[x, y]];
            *next = c * laplacian + 2.0 * u[[x, y]] - u_prev[[x, y]];
        });
    }

    fn update_interior_serial(&mut self) {
        let c = self.courant;
        let l = self.grid.l;
        let field = &mut self.field;
        let u = &field.current;
        let u_prev = &field.previous;

        for x in 1..l - 1 {
            for y in 1..l - 1 {
                let laplacian = u[[x - 1, y]] + u[[x + 1, y]] + u[[x, y - 1]] + u[[x, y + 1]]
                    - 4.0 * u[[x, y]];
                field.next[[x, y]] = c * laplacian + 2.0 * u[[x, y]] - u_prev[[x, y]];
            }
        }
    }

    fn mirror_edges(&mut self) {
        // Zero-gradient condition: copy the nearest interior value outward.
        // Corners are written by both passes; either order converges to the
        // interior diagonal neighbor.
        let l = self.grid.l;
        let next = &mut self.field.next;

        for i in 0..l {
            next[[i, 0]] = next[[i, 1]];
            next[[i, l - 1]] = next[[i, l - 2]];
        }
        for i in 0..l {
            next[[0, i]] = next[[1, i]];
            next[[l - 1, i]] = next[[l - 2, i]];
        }
    }

    /// Re-zero the field buffers. The clock keeps running.
    pub fn reset(&mut self) {
        self.field.reset();
    }

    /// Move the source, clamping to the interior so it can never land on a
    /// boundary cell or out of range.
    pub fn set_source_position(&mut self, x: usize, y: usize) {
        self.source.x = self.grid.clamp_interior(x);
        self.source.y = self.grid.clamp_interior(y);
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.source.amplitude = amplitude;
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.source.frequency = frequency;
    }

    pub fn set_omega(&mut self, omega: f64) {
        self.source.omega = omega;
    }

    /// Rebuild the default barrier material grid.
    pub fn rebuild_default_materials(&mut self) {
        self.materials = Materials::default_barrier(self.grid.l);
    }

    /// Replace the material grid from an image. The new grid is built
    /// completely before it becomes visible; on error the existing grid is
    /// untouched.
    pub fn import_materials(&mut self, img: &RgbImage) -> Result<(), MaterialError> {
        self.materials = Materials::from_image(self.grid.l, img)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::{BARRIER, FREE_MEDIUM};

    fn params(wave_speed: f64) -> SimulationParams {
        SimulationParams {
            wave_speed,
            dt: 1.0 / 60.0,
        }
    }

    fn assert_mirrored(sim: &Simulation) {
        let l = sim.grid.l;
        let u = &sim.field.current;
        for i in 0..l {
            assert_eq!(u[[i, 0]], u[[i, 1]], "bottom edge at {i}");
            assert_eq!(u[[0, i]], u[[1, i]], "left edge at {i}");
            assert_eq!(u[[i, l - 1]], u[[i, l - 2]], "top edge at {i}");
            assert_eq!(u[[l - 1, i]], u[[l - 2, i]], "right edge at {i}");
        }
    }

    #[test]
    fn test_single_tick_trace() {
        // l = 5, source at (2, 2): sin(0) = 0, so the first tick leaves the
        // field all zero and only the clock moves.
        let mut sim = Simulation::new(2, params(0.1), Source::new(2, 2, 1.0, 1.0, 1.0));
        sim.step();

        assert!(sim.field.current.iter().all(|&v| v == 0.0));
        assert_eq!(sim.time(), 1.0 / 60.0);
    }

    #[test]
    fn test_edge_mirror_invariant() {
        let mut sim = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        for _ in 0..25 {
            sim.step();
            assert_mirrored(&sim);
        }
    }

    #[test]
    fn test_determinism_repeated_runs() {
        let run = || {
            let mut sim = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
            for _ in 0..50 {
                sim.step();
            }
            sim.field.current.clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut parallel = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        let mut serial = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        for _ in 0..50 {
            parallel.step();
            serial.step_serial();
        }
        assert_eq!(parallel.field.current, serial.field.current);
    }

    #[test]
    fn test_stable_scheme_does_not_grow() {
        // courant ~ 0.005 at l = 41; a stationary unit spike must never
        // exceed its initial maximum with the source silent.
        let mut sim = Simulation::new(20, params(0.1), Source::new(3, 3, 0.0, 2.4, 6.0));
        let center = sim.grid.l / 2;
        sim.field.current[[center, center]] = 1.0;
        sim.field.previous[[center, center]] = 1.0;

        for _ in 0..300 {
            sim.step();
            let max = sim.field.current.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
            assert!(max <= 1.0 + 1e-9, "field grew to {max}");
        }
    }

    #[test]
    fn test_unstable_scheme_blows_up() {
        // v * dt / dx = 4.5 * 21 / 60 = 1.575, courant ~ 2.48 > 1
        let mut sim = Simulation::new(10, params(4.5), Source::new(3, 3, 0.0, 2.4, 6.0));
        let center = sim.grid.l / 2;
        sim.field.current[[center, center]] = 1.0;
        sim.field.previous[[center, center]] = 1.0;

        for _ in 0..60 {
            sim.step();
        }
        let max = sim.field.current.iter().fold(0.0_f64, |m, &v| m.max(v.abs()));
        assert!(max > 1e6, "expected unbounded growth, got {max}");
    }

    #[test]
    fn test_reset_zeroes_field_only() {
        let mut sim = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        for _ in 0..10 {
            sim.step();
        }
        let t_before = sim.time();
        sim.reset();
        assert!(sim.field.current.iter().all(|&v| v == 0.0));
        assert!(sim.field.previous.iter().all(|&v| v == 0.0));
        assert_eq!(sim.time(), t_before);
    }

    #[test]
    fn test_source_position_is_clamped() {
        let mut sim = Simulation::new(8, params(0.1), Source::new(0, 0, 127.0, 2.4, 6.0));
        // Construction clamps too
        assert_eq!((sim.source().x, sim.source().y), (1, 1));

        sim.set_source_position(1000, 3);
        assert_eq!((sim.source().x, sim.source().y), (15, 3));
    }

    #[test]
    fn test_source_repositioning_takes_effect_next_tick() {
        let mut sim = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        sim.step();
        sim.set_source_position(10, 10);
        sim.step();
        // The new cell was driven with sin at t = dt, which is nonzero
        assert_ne!(sim.field.previous[[10, 10]], 0.0);
    }

    #[test]
    fn test_materials_never_read_by_integrator() {
        // Two sims differing only in materials produce identical fields.
        let mut with_barrier = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        let mut free = Simulation::new(8, params(0.1), Source::new(5, 5, 127.0, 2.4, 6.0));
        free.rebuild_default_materials();
        for _ in 0..30 {
            with_barrier.step();
            free.step();
        }
        assert_eq!(with_barrier.field.current, free.field.current);
    }

    #[test]
    fn test_import_failure_leaves_materials_unchanged() {
        let mut sim = Simulation::new(100, params(0.1), Source::new(100, 100, 127.0, 2.4, 6.0));
        let img = image::RgbImage::new(201, 202);
        assert!(sim.import_materials(&img).is_err());
        // Default barrier still in place
        assert_eq!(sim.materials().coeff(100, 50), BARRIER);
        assert_eq!(sim.materials().coeff(0, 0), FREE_MEDIUM);
    }
}
