//! The per-frame driver: owns the fields, composes the kernels and the
//! pressure solver into a time step, and exposes the small facade the
//! renderer and input layer talk to.

use glam::Vec3;

use crate::advection::{self, AdvectParams};
use crate::config::{AdvectionMethod, FluidConfig, FluidImpulse, PoissonMethod};
use crate::constants::{DENSITY_CLIP_THRESHOLD, MAX_TIME_STEP, PSI_MIN_GRID_WIDTH};
use crate::forcing;
use crate::metrics::{FrameMetrics, Operation};
use crate::poisson::{residual_norm, MultigridSolver, PressureSolver};
use crate::projection::{self, BoundaryParams};
use crate::volume::{GridVolume, VectorVolume};
use crate::vorticity;

/// Coarsest-level floor for the pressure hierarchy, derived from the grid
/// so small test grids still get a real hierarchy.
fn pressure_min_grid_width(width: usize, height: usize, depth: usize) -> usize {
    (width.min(height).min(depth) / 4).clamp(8, 32)
}

pub struct FluidSimulator {
    config: FluidConfig,
    cell_size: f32,

    pub velocity: VectorVolume,
    /// Velocity before the self-advection swap; the vorticity pass reads it.
    pub velocity_prev: VectorVolume,
    pub density: GridVolume,
    pub temperature: GridVolume,
    /// Pressure persists across frames as the solver's warm start.
    pub pressure: GridVolume,
    /// Right-hand side of the last pressure solve.
    pub divergence: GridVolume,

    // Generic scratch, aliased freely within a frame.
    aux1: GridVolume,
    aux2: GridVolume,

    // Created the first frame vorticity confinement is enabled.
    vorticity: Option<VectorVolume>,
    vort_conf: Option<VectorVolume>,
    vort_aux: Option<VectorVolume>,

    pressure_solver: PressureSolver,
    psi_solver: Option<MultigridSolver>,

    manual_impulse: Option<(f32, f32)>,
    metrics: FrameMetrics,
}

impl FluidSimulator {
    pub fn new(config: FluidConfig) -> Self {
        let [width, height, depth] = config.grid_size;
        let cell_size = config.cell_size();
        let pressure_solver = PressureSolver::new(
            config.poisson_method,
            width,
            height,
            depth,
            pressure_min_grid_width(width, height, depth),
        );

        Self {
            cell_size,
            velocity: VectorVolume::new(width, height, depth),
            velocity_prev: VectorVolume::new(width, height, depth),
            density: GridVolume::new(width, height, depth),
            temperature: GridVolume::new(width, height, depth),
            pressure: GridVolume::new(width, height, depth),
            divergence: GridVolume::new(width, height, depth),
            aux1: GridVolume::new(width, height, depth),
            aux2: GridVolume::new(width, height, depth),
            vorticity: None,
            vort_conf: None,
            vort_aux: None,
            pressure_solver,
            psi_solver: None,
            manual_impulse: None,
            metrics: FrameMetrics::new(),
            config,
        }
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Swap in updated tuning fields. The grid size is fixed at
    /// construction; changing the solver method rebuilds the solver.
    pub fn notify_config_changed(&mut self, config: FluidConfig) {
        assert_eq!(
            config.grid_size, self.config.grid_size,
            "grid size cannot change on a live simulator"
        );
        if config.poisson_method != self.config.poisson_method {
            let [width, height, depth] = config.grid_size;
            self.pressure_solver = PressureSolver::new(
                config.poisson_method,
                width,
                height,
                depth,
                pressure_min_grid_width(width, height, depth),
            );
        }
        self.cell_size = config.cell_size();
        self.config = config;
    }

    /// Clear every field back to the initial state.
    pub fn reset(&mut self) {
        self.velocity.clear();
        self.velocity_prev.clear();
        self.density.clear();
        self.temperature.clear();
        self.pressure.clear();
        self.divergence.clear();
        self.aux1.clear();
        self.aux2.clear();
        if let Some(v) = &mut self.vorticity {
            v.clear();
        }
        if let Some(v) = &mut self.vort_conf {
            v.clear();
        }
        if let Some(v) = &mut self.vort_aux {
            v.clear();
        }
        self.metrics.reset();
    }

    pub fn density_field(&self) -> &GridVolume {
        &self.density
    }

    pub fn temperature_field(&self) -> &GridVolume {
        &self.temperature
    }

    pub fn velocity_field(&self) -> &VectorVolume {
        &self.velocity
    }

    /// Begin a manual impulse at normalised [-1, 1] floor coordinates.
    pub fn start_impulse(&mut self, x: f32, y: f32) {
        self.manual_impulse = Some((x, y));
    }

    pub fn update_impulse(&mut self, x: f32, y: f32) {
        if let Some(hotspot) = &mut self.manual_impulse {
            *hotspot = (x, y);
        }
    }

    pub fn stop_impulse(&mut self) {
        self.manual_impulse = None;
    }

    pub fn is_impulsing(&self) -> bool {
        self.manual_impulse.is_some()
    }

    /// Average and maximum |r| of the last pressure solve, on demand.
    pub fn pressure_residual_norm(&self) -> (f32, f32) {
        residual_norm(&self.pressure, &self.divergence, self.cell_size)
    }

    /// Rolling per-phase timings of recent frames.
    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    fn boundary(&self) -> BoundaryParams {
        BoundaryParams {
            staggered: self.config.staggered,
            outflow: self.config.outflow,
        }
    }

    fn advect_params(&self, dt: f32, dissipation: f32, method: AdvectionMethod) -> AdvectParams {
        AdvectParams {
            method,
            dt,
            dissipation,
            staggered: self.config.staggered,
            mid_point: self.config.mid_point,
        }
    }

    /// Advance the simulation one step.
    pub fn update(&mut self, delta_time: f32, seconds_elapsed: f64, frame_index: u32) {
        let dt = if self.config.fixed_time_step > 0.0 {
            self.config.fixed_time_step
        } else {
            delta_time.min(MAX_TIME_STEP)
        };

        self.metrics.on_frame_begins();

        self.apply_impulse(seconds_elapsed);
        self.metrics.on_operation(Operation::ApplyImpulse);

        let bp = self.boundary();
        projection::compute_divergence(&mut self.divergence, &self.velocity, self.cell_size, bp);
        self.metrics.on_operation(Operation::ComputeDivergence);

        self.solve_pressure();
        self.metrics.on_operation(Operation::SolvePressure);

        projection::subtract_gradient(&mut self.velocity, &self.pressure, self.cell_size, bp);
        self.metrics.on_operation(Operation::RectifyVelocity);

        self.advect_temperature(dt);
        self.metrics.on_operation(Operation::AdvectTemperature);

        self.advect_density(dt);
        self.metrics.on_operation(Operation::AdvectDensity);

        self.advect_velocity(dt);
        self.metrics.on_operation(Operation::AdvectVelocity);

        self.restore_vorticity(dt);
        self.metrics.on_operation(Operation::RestoreVorticity);

        self.apply_buoyancy(dt);
        self.metrics.on_operation(Operation::ApplyBuoyancy);

        self.revise_density();
        self.metrics.on_frame_ends();

        log::trace!("frame {} done (dt = {})", frame_index, dt);
    }

    fn solve_pressure(&mut self) {
        let iterations = match self.config.poisson_method {
            PoissonMethod::Jacobi | PoissonMethod::DampedJacobi => {
                self.config.num_jacobi_iterations
            }
            PoissonMethod::MultiGrid => self.config.num_multigrid_iterations,
            PoissonMethod::FullMultiGrid => self.config.num_full_multigrid_iterations,
            PoissonMethod::Mgpcg => self.config.num_mgpcg_iterations,
        };
        self.pressure_solver.solve(
            &mut self.pressure,
            &self.divergence,
            self.cell_size,
            iterations,
        );
    }

    fn grid_extent(&self) -> Vec3 {
        let [w, h, d] = self.config.grid_size;
        Vec3::new(w as f32, h as f32, d as f32)
    }

    fn apply_impulse(&mut self, seconds_elapsed: f64) {
        let extent = self.grid_extent();
        let emit = Vec3::from(self.config.emit_position);
        let mut pos = emit * extent;
        let splat_radius = extent.x * self.config.splat_radius_factor;

        let time_stretch = (self.config.time_stretch + 1e-5) as f64;
        let phase = seconds_elapsed / time_stretch * std::f64::consts::TAU;
        let sin_factor = phase.sin() as f32;
        let cos_factor = phase.cos() as f32;
        let mut hotspot = Vec3::new(
            cos_factor * splat_radius * 0.8 + pos.x,
            0.0,
            sin_factor * splat_radius * 0.8 + pos.z,
        );

        if let Some((x, y)) = self.manual_impulse {
            hotspot = Vec3::new(
                0.5 * extent.x * (x + 1.0),
                0.0,
                0.5 * extent.z * (y + 1.0),
            );
        } else if !self.config.auto_impulse {
            return;
        }

        let density_value = self.config.impulse_density;
        let temperature_value = self.config.impulse_temperature;

        match self.config.fluid_impulse {
            FluidImpulse::HotFloor => {
                forcing::apply_impulse(&mut self.density, pos, hotspot, splat_radius, density_value);
                forcing::apply_impulse(
                    &mut self.temperature,
                    pos,
                    hotspot,
                    splat_radius,
                    temperature_value,
                );
            }
            FluidImpulse::BuoyantJet => {
                pos.x = pos.y;
                pos.y = splat_radius + 2.0;
                forcing::apply_impulse(&mut self.density, pos, hotspot, splat_radius, density_value);
                forcing::apply_impulse(
                    &mut self.temperature,
                    pos,
                    hotspot,
                    splat_radius,
                    temperature_value,
                );

                // Pulse sideways velocity every other stretch period.
                let period = (seconds_elapsed / time_stretch) as i64;
                if period % 2 != 0 {
                    let coef = (seconds_elapsed * 2.0 * std::f64::consts::TAU).sin() as f32;
                    let initial_velocity = (1.0 + coef * 0.5) * self.config.impulse_velocity;
                    forcing::apply_impulse(
                        &mut self.velocity.x,
                        pos,
                        hotspot,
                        splat_radius,
                        initial_velocity,
                    );
                }
            }
            FluidImpulse::Sphere => {
                forcing::apply_impulse_sphere(&mut self.density, pos, splat_radius, density_value);
                forcing::apply_impulse_sphere(
                    &mut self.temperature,
                    pos,
                    splat_radius,
                    temperature_value,
                );
            }
            FluidImpulse::FlyingBall => {
                // The ball orbits the domain mid-plane and drags its own
                // velocity along.
                let center = Vec3::new(
                    extent.x * (0.5 + 0.25 * cos_factor),
                    extent.y * 0.5,
                    extent.z * (0.5 + 0.25 * sin_factor),
                );
                forcing::apply_impulse_sphere(&mut self.density, center, splat_radius, density_value);
                forcing::apply_impulse_sphere(
                    &mut self.temperature,
                    center,
                    splat_radius,
                    temperature_value,
                );
                let tangential = self.config.impulse_velocity;
                forcing::apply_impulse_sphere(
                    &mut self.velocity.x,
                    center,
                    splat_radius,
                    -sin_factor * tangential,
                );
                forcing::apply_impulse_sphere(
                    &mut self.velocity.z,
                    center,
                    splat_radius,
                    cos_factor * tangential,
                );
            }
        }
    }

    fn advect_temperature(&mut self, dt: f32) {
        let p = self.advect_params(
            dt,
            self.config.temperature_dissipation,
            self.config.advection_method,
        );
        advection::advect_scalar(
            &mut self.aux1,
            &self.temperature,
            &self.velocity,
            &mut self.aux2,
            &p,
        );
        std::mem::swap(&mut self.temperature, &mut self.aux1);
    }

    fn advect_density(&mut self, dt: f32) {
        let p = self.advect_params(
            dt,
            self.config.density_dissipation,
            self.config.advection_method,
        );
        advection::advect_scalar(
            &mut self.aux1,
            &self.density,
            &self.velocity,
            &mut self.aux2,
            &p,
        );
        std::mem::swap(&mut self.density, &mut self.aux1);
    }

    fn advect_velocity(&mut self, dt: f32) {
        let p = self.advect_params(
            dt,
            self.config.velocity_dissipation,
            self.config.advection_method,
        );
        advection::advect_vector(
            &mut self.velocity_prev,
            &self.velocity,
            &self.velocity,
            &mut self.aux1,
            &p,
        );
        // velocity_prev now holds the advected field; after the swap it
        // keeps the pre-advection velocity for the vorticity pass.
        std::mem::swap(&mut self.velocity, &mut self.velocity_prev);
    }

    fn restore_vorticity(&mut self, dt: f32) {
        let coeff = self.config.vorticity_confinement;
        if coeff <= 0.0 {
            return;
        }
        let [width, height, depth] = self.config.grid_size;
        let staggered = self.config.staggered;
        let h = self.cell_size;
        let bp = self.boundary();

        let vort = self
            .vorticity
            .get_or_insert_with(|| VectorVolume::new(width, height, depth));
        let conf = self
            .vort_conf
            .get_or_insert_with(|| VectorVolume::new(width, height, depth));
        let temp = self
            .vort_aux
            .get_or_insert_with(|| VectorVolume::new(width, height, depth));

        vorticity::compute_curl(vort, &self.velocity_prev, h, staggered);
        vorticity::build_vorticity_confinement(conf, vort, coeff * dt, h);

        // Predict where the vorticity goes: stretch, decay with the local
        // expansion, then ride the pre-projection velocity.
        vorticity::stretch_vortices(temp, &self.velocity_prev, vort, h, dt, staggered);
        projection::compute_divergence(&mut self.aux1, &self.velocity_prev, h, bp);
        vorticity::decay_vortices(temp, &self.aux1, dt);

        let p = AdvectParams {
            method: AdvectionMethod::SemiLagrangian,
            dt,
            dissipation: 0.0,
            staggered,
            mid_point: self.config.mid_point,
        };
        advection::advect_scalar(&mut vort.x, &temp.x, &self.velocity_prev, &mut self.aux2, &p);
        advection::advect_scalar(&mut vort.y, &temp.y, &self.velocity_prev, &mut self.aux2, &p);
        advection::advect_scalar(&mut vort.z, &temp.z, &self.velocity_prev, &mut self.aux2, &p);

        // What the new velocity actually carries, and what went missing.
        vorticity::compute_curl(temp, &self.velocity, h, staggered);
        vorticity::compute_delta_vorticity(temp, vort);

        // Solve curl(curl(psi)) = delta via three independent Poisson
        // systems on -delta, then inject curl(psi). The vorticity volume is
        // reused as the streamfunction.
        temp.x.scale(-1.0);
        temp.y.scale(-1.0);
        temp.z.scale(-1.0);

        let psi_solver = self
            .psi_solver
            .get_or_insert_with(|| MultigridSolver::new(width, height, depth, PSI_MIN_GRID_WIDTH));
        let iterations = self.config.num_multigrid_iterations.max(1);
        for (psi, rhs) in [
            (&mut vort.x, &temp.x),
            (&mut vort.y, &temp.y),
            (&mut vort.z, &temp.z),
        ] {
            psi_solver.solve_as_preconditioner(psi, rhs, h);
            for _ in 1..iterations {
                psi_solver.solve(psi, rhs, h, 1);
            }
        }

        vorticity::add_curl_psi(&mut self.velocity, vort, h, staggered);
        vorticity::apply_vorticity_confinement(&mut self.velocity, conf, staggered);
    }

    fn apply_buoyancy(&mut self, dt: f32) {
        forcing::apply_buoyancy(
            &mut self.velocity,
            &self.temperature,
            &self.density,
            dt,
            self.config.ambient_temperature,
            self.config.smoke_buoyancy,
            self.config.smoke_weight,
            self.config.staggered,
        );
    }

    fn revise_density(&mut self) {
        if self.config.fluid_impulse != FluidImpulse::HotFloor {
            return;
        }
        let extent = self.grid_extent();
        let pos = Vec3::from(self.config.emit_position) * extent;
        forcing::revise_density(
            &mut self.density,
            pos,
            extent.x * 0.5,
            DENSITY_CLIP_THRESHOLD,
        );
    }
}
