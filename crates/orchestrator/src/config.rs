//! Configuration parsing and validation for SPH simulations

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use sph2d_kernel::{DomainBox, EquationOfState, RebuildPolicy, SimParams};

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable simulation name
    pub name: String,
    /// Number of particles placed at startup
    pub particle_count: usize,
    /// Simulation domain bounds
    pub domain: DomainBounds,
    /// Constant acceleration applied to every particle
    #[serde(default = "default_external_force")]
    pub external_force: [f32; 2],
    /// Wall collision radius of a particle
    #[serde(default = "default_particle_radius")]
    pub particle_radius: f32,
    /// Fraction of speed kept after a wall bounce
    #[serde(default = "default_collision_loss")]
    pub collision_loss: f32,
    /// Smoothing radius and grid cell size
    #[serde(default = "default_influence_radius")]
    pub influence_radius: f32,
    /// Density at which pressure is zero
    #[serde(default = "default_target_density")]
    pub target_density: f32,
    /// Equation of state stiffness
    #[serde(default = "default_pressure_multiplier")]
    pub pressure_multiplier: f32,
    /// Spatial hash rebuild cadence
    #[serde(default)]
    pub rebuild: RebuildPolicy,
    /// Velocity components below this are zeroed after each step (0 = off)
    #[serde(default)]
    pub velocity_deadband: f32,
    /// Fixed timestep
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Stop after this many timesteps
    pub max_steps: Option<u64>,
    /// Size of a dedicated worker pool (default: rayon's global pool)
    pub worker_threads: Option<usize>,
    /// Seed for reproducible initial placement
    pub seed: Option<u64>,
    /// Publish a particle snapshot every this many steps
    #[serde(default = "default_snapshot_every")]
    pub snapshot_every: u64,
}

/// Domain extent. The lower corner is always the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainBounds {
    /// Right wall
    pub max_x: f32,
    /// Bottom wall
    pub max_y: f32,
}

// Default values
fn default_external_force() -> [f32; 2] {
    [0.0, 1.0]
}

fn default_particle_radius() -> f32 {
    5.0
}

fn default_collision_loss() -> f32 {
    0.7
}

fn default_influence_radius() -> f32 {
    100.0
}

fn default_target_density() -> f32 {
    sph2d_kernel::eos::DEFAULT_TARGET_DENSITY
}

fn default_pressure_multiplier() -> f32 {
    sph2d_kernel::eos::DEFAULT_PRESSURE_MULTIPLIER
}

fn default_dt() -> f32 {
    1.0
}

fn default_snapshot_every() -> u64 {
    10
}

impl SimulationConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.domain.max_x > 0.0 && self.domain.max_y > 0.0) {
            return invalid("domain max_x and max_y must be positive");
        }
        if self.particle_radius < 0.0 {
            return invalid("particle_radius must be non-negative");
        }
        let diameter = 2.0 * self.particle_radius;
        if self.domain.max_x <= diameter || self.domain.max_y <= diameter {
            return invalid("domain must be larger than one particle diameter");
        }
        if !(0.0..=1.0).contains(&self.collision_loss) {
            return invalid("collision_loss must be in range [0, 1]");
        }
        if !(self.influence_radius > 0.0) {
            return invalid("influence_radius must be positive");
        }
        if !(self.dt > 0.0) {
            return invalid("dt must be positive");
        }
        if !(self.velocity_deadband >= 0.0) {
            return invalid("velocity_deadband must be non-negative");
        }
        if let RebuildPolicy::Periodic { every: 0 } = self.rebuild {
            return invalid("rebuild period must be at least 1");
        }
        if self.max_steps == Some(0) {
            return invalid("max_steps must be at least 1");
        }
        if self.worker_threads == Some(0) {
            return invalid("worker_threads must be at least 1");
        }
        if self.snapshot_every == 0 {
            return invalid("snapshot_every must be at least 1");
        }

        // Everything else the kernel checks itself (finite values etc.)
        self.to_params()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Kernel parameters described by this configuration
    pub fn to_params(&self) -> SimParams {
        SimParams {
            domain: DomainBox {
                max_x: self.domain.max_x,
                max_y: self.domain.max_y,
                particle_radius: self.particle_radius,
                restitution: self.collision_loss,
            },
            external_force: self.external_force,
            influence_radius: self.influence_radius,
            eos: EquationOfState::new(self.target_density, self.pressure_multiplier),
            rebuild: self.rebuild,
            velocity_deadband: self.velocity_deadband,
        }
    }
}
