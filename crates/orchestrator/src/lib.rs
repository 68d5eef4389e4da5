//! Orchestration Layer
//!
//! This crate drives the 2-D SPH kernel outside of any rendering loop:
//! - JSON configuration loading and validation
//! - Simulation construction from a configuration
//! - Simulation runner with lifecycle management (start, pause, resume, reset)

#![warn(missing_docs)]

pub mod config;
pub mod runner;

pub use config::{ConfigError, SimulationConfig};
pub use runner::{FrameSnapshot, RunnerState, SimulationRunner};

use sph2d_kernel::Simulation;
use std::path::Path;

/// Errors from setting up or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The kernel rejected the setup or failed a step.
    #[error("simulation error: {0}")]
    Kernel(#[from] sph2d_kernel::Error),
    /// The runner thread panicked.
    #[error("simulation thread panicked")]
    RunnerPanicked,
}

/// Build a kernel simulation described by `config`.
///
/// Particles are placed uniformly at random inside the walls, reproducibly
/// when `config.seed` is set. A dedicated worker pool is created when
/// `config.worker_threads` is set.
pub fn build_simulation(config: &SimulationConfig) -> Result<Simulation, OrchestratorError> {
    let params = config.to_params();
    let mut sim = Simulation::initialize(config.particle_count, params, config.seed)?;
    if let Some(threads) = config.worker_threads {
        sim = sim.with_worker_threads(threads)?;
    }
    Ok(sim)
}

/// Create a simulation runner from a configuration file
///
/// This function performs the full simulation setup pipeline:
/// 1. Load and validate the configuration
/// 2. Build the kernel simulation
/// 3. Wrap it in a `SimulationRunner` for lifecycle management
///
/// # Example
/// ```no_run
/// use sph2d_orchestrator::create_simulation;
///
/// let runner = create_simulation("configs/window.json")?;
/// runner.start();
/// // ... query status, pause, resume, etc.
/// # Ok::<(), sph2d_orchestrator::OrchestratorError>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<SimulationRunner, OrchestratorError> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    // 1. Load and validate configuration
    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    // 2. Build the simulation
    let sim = build_simulation(&config)?;

    // 3. Wrap in SimulationRunner
    let runner = SimulationRunner::new(
        Box::new(sim),
        config.dt,
        config.max_steps,
        config.snapshot_every,
    );

    tracing::info!("Simulation ready to start");
    Ok(runner)
}
