//! 2-D SPH Fluid Simulation Kernel
//!
//! This crate advances a set of fluid particles with Smoothed Particle
//! Hydrodynamics. It is compute-only: drawing, input and process lifecycle
//! belong to the caller.
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and read-only views.
//! - [`sph`] -- Smoothing kernels, density estimator, pressure acceleration.
//! - [`eos`] -- Linear equation of state and shared pair pressure.
//! - [`neighbor`] -- Sorted spatial hash and neighbor queries.
//! - [`radix`] -- LSD radix sort used to build the spatial hash.
//! - [`boundary`] -- Axis-aligned walls with restitution.
//! - [`integrator`] -- Semi-implicit Euler step.
//! - [`simulation`] -- Step orchestrator owning particles and the index.
//! - [`field`] -- Density and pressure sampled over the domain.

#![warn(missing_docs)]

pub mod boundary;
pub mod eos;
pub mod error;
pub mod field;
pub mod integrator;
pub mod neighbor;
pub mod particle;
pub mod radix;
pub mod simulation;
pub mod sph;

pub use boundary::DomainBox;
pub use eos::EquationOfState;
pub use error::{Error, Result};
pub use field::{FieldStats, ScalarField};
pub use neighbor::{NeighborSearch, SpatialHash, SpatialLookupEntry};
pub use particle::{ParticleArrays, ParticleView};
pub use simulation::{RebuildPolicy, SimParams, Simulation, StepPhase};
pub use sph::{smoothing_kernel, smoothing_kernel_gradient, spiky_kernel};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate statistics for a simulation snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepMetrics {
    /// Largest relative deviation of a particle density from the target.
    pub max_density_deviation: f32,
    /// Mean particle density.
    pub mean_density: f32,
    /// Total kinetic energy.
    pub kinetic_energy: f64,
    /// Largest particle speed.
    pub max_speed: f32,
}

/// Interface a runner drives a simulation through.
///
/// Each `step` runs the density pass, an optional spatial index rebuild and
/// the force pass, in that order.
pub trait SimulationKernel {
    /// Advance by `dt`. `frame_index` selects whether the index is rebuilt.
    fn step(&mut self, dt: f32, frame_index: u64) -> Result<()>;

    /// Read back current particle state.
    fn particles(&self) -> &ParticleArrays;

    /// Number of particles in the simulation.
    fn particle_count(&self) -> usize;

    /// Current aggregate statistics.
    fn metrics(&self) -> StepMetrics;

    /// Scatter the particles again and bring them to rest.
    fn reset(&mut self);
}
