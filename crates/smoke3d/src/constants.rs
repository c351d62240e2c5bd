//! Shared numeric constants for the solver and driver.

/// (1 - omega) for the damped Jacobi sweep with omega = 2/3.
pub const ONE_MINUS_OMEGA: f32 = 1.0 / 3.0;

/// omega / beta for the 6-neighbour Laplacian stencil (beta = 6, omega = 2/3).
pub const OMEGA_OVER_BETA: f32 = 1.0 / 9.0;

/// Plain sweeps on the coarsest multigrid level, after the zero-guess sweep.
pub const COARSEST_LEVEL_SWEEPS: usize = 15;

/// Largest step the adaptive time-step path will take, in seconds.
pub const MAX_TIME_STEP: f32 = 0.33;

/// Coarsest-level floor handed to the streamfunction solver. The pressure
/// solver derives its own floor from the grid size.
pub const PSI_MIN_GRID_WIDTH: usize = 8;

/// Densities below this are zeroed near the emitter in hot-floor mode.
pub const DENSITY_CLIP_THRESHOLD: f32 = 0.1;
