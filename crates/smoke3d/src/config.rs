//! Simulation configuration.
//!
//! Every tunable the driver reads lives here, with defaults that reproduce
//! the stock smoke demo (128^3 grid, full-multigrid pressure solve). Configs
//! round-trip through JSON so a scene can be saved and restored.

use serde::{Deserialize, Serialize};

/// Scheme used to backtrace fields along the velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvectionMethod {
    SemiLagrangian,
    MacCormackSemiLagrangian,
    BfeccSemiLagrangian,
}

/// Strategy for the pressure Poisson solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoissonMethod {
    Jacobi,
    DampedJacobi,
    MultiGrid,
    FullMultiGrid,
    Mgpcg,
}

/// Shape and placement of the external forcing term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluidImpulse {
    HotFloor,
    Sphere,
    BuoyantJet,
    FlyingBall,
}

fn default_grid_size() -> [usize; 3] {
    [128, 128, 128]
}
fn default_domain_size() -> f32 {
    19.2
}
fn default_advection_method() -> AdvectionMethod {
    AdvectionMethod::MacCormackSemiLagrangian
}
fn default_poisson_method() -> PoissonMethod {
    PoissonMethod::FullMultiGrid
}
fn default_num_jacobi_iterations() -> usize {
    40
}
fn default_num_multigrid_iterations() -> usize {
    2
}
fn default_num_full_multigrid_iterations() -> usize {
    2
}
fn default_num_mgpcg_iterations() -> usize {
    10
}
fn default_fixed_time_step() -> f32 {
    0.0
}
fn default_time_stretch() -> f32 {
    2.0
}
fn default_ambient_temperature() -> f32 {
    0.0
}
fn default_impulse_temperature() -> f32 {
    40.0
}
fn default_impulse_density() -> f32 {
    1.0
}
fn default_impulse_velocity() -> f32 {
    8.0
}
fn default_smoke_buoyancy() -> f32 {
    1.0
}
fn default_smoke_weight() -> f32 {
    0.05
}
fn default_temperature_dissipation() -> f32 {
    0.15
}
fn default_velocity_dissipation() -> f32 {
    0.001
}
fn default_density_dissipation() -> f32 {
    0.2
}
fn default_splat_radius_factor() -> f32 {
    0.25
}
fn default_emit_position() -> [f32; 3] {
    [0.5, 0.0, 0.5]
}
fn default_staggered() -> bool {
    true
}
fn default_mid_point() -> bool {
    false
}
fn default_outflow() -> bool {
    false
}
fn default_auto_impulse() -> bool {
    true
}
fn default_vorticity_confinement() -> f32 {
    0.1
}
fn default_fluid_impulse() -> FluidImpulse {
    FluidImpulse::HotFloor
}

/// All simulation tunables. Fields are read once per frame by the driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Cells per axis (W, H, D).
    #[serde(default = "default_grid_size")]
    pub grid_size: [usize; 3],
    /// Domain extent along x, in metres. Cell size is `domain_size / W`.
    #[serde(default = "default_domain_size")]
    pub domain_size: f32,

    #[serde(default = "default_advection_method")]
    pub advection_method: AdvectionMethod,
    #[serde(default = "default_poisson_method")]
    pub poisson_method: PoissonMethod,

    #[serde(default = "default_num_jacobi_iterations")]
    pub num_jacobi_iterations: usize,
    #[serde(default = "default_num_multigrid_iterations")]
    pub num_multigrid_iterations: usize,
    #[serde(default = "default_num_full_multigrid_iterations")]
    pub num_full_multigrid_iterations: usize,
    #[serde(default = "default_num_mgpcg_iterations")]
    pub num_mgpcg_iterations: usize,

    /// Zero selects the adaptive step, clamped to `MAX_TIME_STEP`.
    #[serde(default = "default_fixed_time_step")]
    pub fixed_time_step: f32,
    /// Period stretch of the auto-impulse hotspot orbit, in seconds.
    #[serde(default = "default_time_stretch")]
    pub time_stretch: f32,

    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f32,
    #[serde(default = "default_impulse_temperature")]
    pub impulse_temperature: f32,
    #[serde(default = "default_impulse_density")]
    pub impulse_density: f32,
    #[serde(default = "default_impulse_velocity")]
    pub impulse_velocity: f32,

    /// Sigma in the buoyancy term.
    #[serde(default = "default_smoke_buoyancy")]
    pub smoke_buoyancy: f32,
    /// Kappa in the buoyancy term (smoke weight).
    #[serde(default = "default_smoke_weight")]
    pub smoke_weight: f32,

    #[serde(default = "default_temperature_dissipation")]
    pub temperature_dissipation: f32,
    #[serde(default = "default_velocity_dissipation")]
    pub velocity_dissipation: f32,
    #[serde(default = "default_density_dissipation")]
    pub density_dissipation: f32,

    /// Splat radius as a fraction of the grid width.
    #[serde(default = "default_splat_radius_factor")]
    pub splat_radius_factor: f32,
    /// Emitter position in normalised [0, 1] grid coordinates.
    #[serde(default = "default_emit_position")]
    pub emit_position: [f32; 3],

    #[serde(default = "default_staggered")]
    pub staggered: bool,
    /// Mid-point (RK2) backtrace instead of single-step Euler.
    #[serde(default = "default_mid_point")]
    pub mid_point: bool,
    /// Open the floor (y-minus) boundary.
    #[serde(default = "default_outflow")]
    pub outflow: bool,
    #[serde(default = "default_auto_impulse")]
    pub auto_impulse: bool,

    /// Confinement coefficient; zero disables the whole vorticity pass.
    #[serde(default = "default_vorticity_confinement")]
    pub vorticity_confinement: f32,

    #[serde(default = "default_fluid_impulse")]
    pub fluid_impulse: FluidImpulse,
}

impl Default for FluidConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults deserialize")
    }
}

impl FluidConfig {
    /// Cell edge length in metres.
    pub fn cell_size(&self) -> f32 {
        self.domain_size / self.grid_size[0] as f32
    }

    /// Save to a pretty-printed JSON file.
    pub fn save_json(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file; missing fields fall back to their defaults.
    pub fn load_json(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&json)?;
        Ok(config)
    }
}
