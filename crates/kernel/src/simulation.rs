//! Step orchestrator.
//!
//! One `step` runs three phases in a fixed order:
//!
//! 1. **DensityPass** (parallel): every particle's density from its
//!    neighbors, using the grid as it stands or a direct scan when no valid
//!    grid exists.
//! 2. **GridRebuild** (sequential, optional): re-index particles into the
//!    spatial hash, according to the [`RebuildPolicy`].
//! 3. **ForcePass** (parallel): pressure acceleration, integration and wall
//!    resolution for every particle. Workers read a frozen view of positions
//!    and densities and write into a per-particle scratch buffer. The buffer
//!    is copied back after the pass.
//!
//! Each parallel pass returns only after every worker has finished, which
//! is the barrier between phases.

use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::boundary::DomainBox;
use crate::eos::EquationOfState;
use crate::error::{Error, Result};
use crate::field::ScalarField;
use crate::integrator::{self, Kinematics};
use crate::neighbor::{NeighborSearch, SpatialHash};
use crate::particle::{ParticleArrays, ParticleView};
use crate::sph::{self, PARTICLE_MASS};
use crate::{SimulationKernel, StepMetrics};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// When the spatial hash is rebuilt.
///
/// Independently of the policy, the grid is always rebuilt when it is
/// missing or was built for a different particle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Rebuild on every step.
    EveryStep,
    /// Rebuild when `frame_index % every == 0`.
    Periodic {
        /// Rebuild period in frames (> 0).
        every: u64,
    },
    /// Rebuild only while `frame_index < frames`, then keep the last grid.
    FirstFrames {
        /// Number of leading frames that rebuild.
        frames: u64,
    },
}

impl Default for RebuildPolicy {
    fn default() -> Self {
        RebuildPolicy::Periodic { every: 3 }
    }
}

impl RebuildPolicy {
    /// `true` if the policy asks for a rebuild on `frame_index`.
    pub fn should_rebuild(&self, frame_index: u64) -> bool {
        match *self {
            RebuildPolicy::EveryStep => true,
            RebuildPolicy::Periodic { every } => every > 0 && frame_index % every == 0,
            RebuildPolicy::FirstFrames { frames } => frame_index < frames,
        }
    }
}

/// Physical and numerical parameters of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimParams {
    /// Walls, particle radius and restitution.
    pub domain: DomainBox,
    /// Constant acceleration applied to every particle (gravity).
    pub external_force: [f32; 2],
    /// Smoothing radius; also the spatial hash cell size.
    pub influence_radius: f32,
    /// Density to pressure relation.
    pub eos: EquationOfState,
    /// Grid rebuild cadence.
    pub rebuild: RebuildPolicy,
    /// Velocity components below this magnitude are zeroed after each step.
    pub velocity_deadband: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            domain: DomainBox {
                max_x: 2000.0,
                max_y: 1300.0,
                particle_radius: 5.0,
                restitution: 0.7,
            },
            external_force: [0.0, 1.0],
            influence_radius: 100.0,
            eos: EquationOfState::default(),
            rebuild: RebuildPolicy::default(),
            velocity_deadband: 0.0,
        }
    }
}

impl SimParams {
    /// Reject parameter sets the step loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        if !(self.influence_radius.is_finite() && self.influence_radius > 0.0) {
            return Err(Error::InvalidParam(format!(
                "influence_radius must be > 0, got {}",
                self.influence_radius
            )));
        }
        if !self.external_force.iter().all(|f| f.is_finite()) {
            return Err(Error::InvalidParam("external_force must be finite".into()));
        }
        if !(self.eos.target_density.is_finite() && self.eos.stiffness.is_finite()) {
            return Err(Error::InvalidParam(
                "target_density and pressure_multiplier must be finite".into(),
            ));
        }
        if !(self.velocity_deadband.is_finite() && self.velocity_deadband >= 0.0) {
            return Err(Error::InvalidParam(format!(
                "velocity_deadband must be >= 0, got {}",
                self.velocity_deadband
            )));
        }
        if let RebuildPolicy::Periodic { every: 0 } = self.rebuild {
            return Err(Error::InvalidParam("rebuild period must be > 0".into()));
        }
        Ok(())
    }
}

/// Where the orchestrator is within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StepPhase {
    /// No step has run since construction or reset.
    Idle,
    /// Computing densities.
    DensityPass,
    /// Rebuilding the spatial hash.
    GridRebuild,
    /// Computing forces and integrating.
    ForcePass,
    /// The last step completed.
    Done,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A 2-D SPH fluid: particles, parameters and the derived spatial index.
pub struct Simulation {
    particles: ParticleArrays,
    params: SimParams,
    grid: SpatialHash,
    /// Force pass output, one entry per particle.
    scratch: Vec<Kinematics>,
    rng: StdRng,
    phase: StepPhase,
    steps_taken: u64,
    sim_time: f64,
    pool: Option<rayon::ThreadPool>,
}

impl Simulation {
    /// Create a simulation with `count` particles placed uniformly at random
    /// inside the walls, at rest.
    ///
    /// With `seed` set, placement is reproducible.
    pub fn initialize(count: usize, params: SimParams, seed: Option<u64>) -> Result<Self> {
        params.validate()?;
        let mut rng: StdRng = match seed {
            Some(s) => SeedableRng::seed_from_u64(s),
            None => SeedableRng::seed_from_u64(rng().random()),
        };

        let mut particles = ParticleArrays::new();
        particles.try_reserve(count)?;
        for _ in 0..count {
            let [px, py] = random_position(&mut rng, &params.domain);
            particles.push_particle(px, py);
        }

        tracing::info!(
            "Simulation initialized: {} particles, domain {}x{}, influence radius {}",
            count,
            params.domain.max_x,
            params.domain.max_y,
            params.influence_radius
        );
        Self::assemble(particles, params, rng)
    }

    /// Create a simulation from explicitly placed particles.
    pub fn new(particles: ParticleArrays, params: SimParams) -> Result<Self> {
        params.validate()?;
        let n = particles.len();
        let lengths = [
            particles.y.len(),
            particles.vx.len(),
            particles.vy.len(),
            particles.ax.len(),
            particles.ay.len(),
            particles.density.len(),
        ];
        if lengths.iter().any(|&l| l != n) {
            return Err(Error::InvalidParam(
                "particle arrays must all have the same length".into(),
            ));
        }
        let rng = SeedableRng::seed_from_u64(rng().random());
        tracing::info!("Simulation created with {} particles", n);
        Self::assemble(particles, params, rng)
    }

    fn assemble(particles: ParticleArrays, params: SimParams, rng: StdRng) -> Result<Self> {
        let n = particles.len();
        Ok(Self {
            grid: SpatialHash::with_capacity(params.influence_radius, n)?,
            scratch: Vec::with_capacity(n),
            particles,
            params,
            rng,
            phase: StepPhase::Idle,
            steps_taken: 0,
            sim_time: 0.0,
            pool: None,
        })
    }

    /// Run the parallel passes on a dedicated pool of `threads` workers
    /// instead of rayon's global pool.
    pub fn with_worker_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidParam("worker_threads must be > 0".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        tracing::debug!("Using dedicated worker pool with {} threads", threads);
        self.pool = Some(pool);
        Ok(self)
    }

    // --- Accessors ---

    /// Current particle state.
    pub fn particles(&self) -> &ParticleArrays {
        &self.particles
    }

    /// Copy of particle `i`, or `None` if out of range.
    pub fn particle(&self, i: usize) -> Option<ParticleView> {
        self.particles.get(i)
    }

    /// Parameters this simulation runs with.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// The spatial index as of the last rebuild.
    pub fn grid(&self) -> &SpatialHash {
        &self.grid
    }

    /// Phase reached by the most recent step.
    ///
    /// `Done` after a successful step. After a failed step, the phase in
    /// which it failed.
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Steps completed since construction or the last reset.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    /// Sum of `dt` over completed steps.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    // --- Stepping ---

    /// Advance the simulation by `dt`. `frame_index` drives the rebuild
    /// policy.
    ///
    /// A failed grid rebuild returns [`Error::IndexCorrupted`] before any
    /// particle has moved. The simulation should not be stepped again.
    pub fn step(&mut self, dt: f32, frame_index: u64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::InvalidParam(format!("dt must be > 0, got {dt}")));
        }
        let n = self.particles.len();
        let radius = self.params.influence_radius;

        // --- 1. Density pass ---
        self.phase = StepPhase::DensityPass;
        {
            let search = NeighborSearch::for_particles(&self.grid, n);
            let particles = &mut self.particles;
            install(self.pool.as_ref(), || {
                sph::compute_densities(particles, search, radius)
            });
        }
        tracing::trace!(frame = frame_index, "density pass complete");

        // --- 2. Grid rebuild ---
        if self.params.rebuild.should_rebuild(frame_index) || !self.grid.is_built_for(n) {
            self.phase = StepPhase::GridRebuild;
            self.grid.rebuild(&self.particles.x, &self.particles.y)?;
            tracing::trace!(frame = frame_index, "grid rebuilt");
        }

        // --- 3. Force pass ---
        self.phase = StepPhase::ForcePass;
        self.force_pass(dt);

        self.phase = StepPhase::Done;
        self.steps_taken += 1;
        self.sim_time += dt as f64;
        tracing::debug!(
            frame = frame_index,
            step = self.steps_taken,
            "step complete"
        );
        Ok(())
    }

    fn force_pass(&mut self, dt: f32) {
        let Self {
            particles,
            params,
            grid,
            scratch,
            pool,
            ..
        } = self;
        let n = particles.len();
        scratch.clear();
        scratch.resize(n, Kinematics::default());

        let view: &ParticleArrays = particles;
        let search = NeighborSearch::for_particles(grid, n);
        let params: &SimParams = params;
        install(pool.as_ref(), || {
            scratch.par_iter_mut().enumerate().for_each(|(i, out)| {
                let acceleration = sph::pressure_acceleration(
                    i,
                    search,
                    &view.x,
                    &view.y,
                    &view.density,
                    &params.eos,
                    params.influence_radius,
                );
                *out = Kinematics {
                    position: [view.x[i], view.y[i]],
                    velocity: [view.vx[i], view.vy[i]],
                    acceleration,
                };
                integrator::integrate(
                    out,
                    params.external_force,
                    &params.domain,
                    params.velocity_deadband,
                    dt,
                );
            });
        });

        // Commit after every worker is done.
        for (i, k) in scratch.iter().enumerate() {
            particles.x[i] = k.position[0];
            particles.y[i] = k.position[1];
            particles.vx[i] = k.velocity[0];
            particles.vy[i] = k.velocity[1];
            particles.ax[i] = k.acceleration[0];
            particles.ay[i] = k.acceleration[1];
        }
    }

    // --- Growth and restart ---

    /// Add one particle at a random position, at rest. Returns its index.
    pub fn append_particle(&mut self) -> Result<usize> {
        self.particles.try_reserve(1)?;
        let [px, py] = random_position(&mut self.rng, &self.params.domain);
        self.particles.push_particle(px, py);
        self.grid.invalidate();
        let index = self.particles.len() - 1;
        tracing::debug!("Appended particle {} at ({:.1}, {:.1})", index, px, py);
        Ok(index)
    }

    /// Scatter every particle to a new random position and bring it to rest.
    ///
    /// The particle count is kept. The step counter and simulation time go
    /// back to zero.
    pub fn reset(&mut self) {
        let domain = self.params.domain;
        for i in 0..self.particles.len() {
            let [px, py] = random_position(&mut self.rng, &domain);
            self.particles.x[i] = px;
            self.particles.y[i] = py;
        }
        self.particles.clear_dynamics();
        self.grid.invalidate();
        self.phase = StepPhase::Idle;
        self.steps_taken = 0;
        self.sim_time = 0.0;
        tracing::info!("Simulation reset ({} particles)", self.particles.len());
    }

    // --- Probes ---

    /// Density at an arbitrary point, from current positions.
    ///
    /// The step's grid is built before the force pass moves the particles,
    /// so it never matches current positions; this scans every particle.
    pub fn query_density(&self, point: [f32; 2]) -> f32 {
        self.density_with(NeighborSearch::BruteForce, point)
    }

    fn density_with(&self, search: NeighborSearch<'_>, point: [f32; 2]) -> f32 {
        sph::density_at(
            point,
            search,
            &self.particles.x,
            &self.particles.y,
            self.params.influence_radius,
        )
    }

    /// Pressure at an arbitrary point.
    pub fn query_pressure(&self, point: [f32; 2]) -> f32 {
        self.params.eos.density_to_pressure(self.query_density(point))
    }

    /// Density sampled over the whole domain every `spacing` units.
    ///
    /// Current positions are indexed into a fresh grid first, so every
    /// sample equals [`query_density`](Self::query_density) at that point.
    pub fn density_field(&self, spacing: f32) -> Result<ScalarField> {
        let n = self.particles.len();
        let mut index = SpatialHash::with_capacity(self.params.influence_radius, n)?;
        index.rebuild(&self.particles.x, &self.particles.y)?;
        let search = NeighborSearch::for_particles(&index, n);

        let domain = &self.params.domain;
        install(self.pool.as_ref(), || {
            ScalarField::sample(domain.max_x, domain.max_y, spacing, |p| {
                self.density_with(search, p)
            })
        })
    }

    /// Pressure sampled over the whole domain every `spacing` units.
    pub fn pressure_field(&self, spacing: f32) -> Result<ScalarField> {
        let eos = self.params.eos;
        Ok(self
            .density_field(spacing)?
            .map(|rho| eos.density_to_pressure(rho)))
    }

    /// Aggregate statistics over the current particle state.
    pub fn metrics(&self) -> StepMetrics {
        let n = self.particles.len();
        if n == 0 {
            return StepMetrics::default();
        }
        let target = self.params.eos.target_density;
        let mut max_dev = 0.0f32;
        let mut total = 0.0f64;
        for &rho in &self.particles.density {
            let dev = if target.abs() > 0.0 {
                (rho - target).abs() / target.abs()
            } else {
                rho.abs()
            };
            max_dev = max_dev.max(dev);
            total += rho as f64;
        }
        StepMetrics {
            max_density_deviation: max_dev,
            mean_density: (total / n as f64) as f32,
            kinetic_energy: self.particles.kinetic_energy(PARTICLE_MASS),
            max_speed: self.particles.max_speed(),
        }
    }
}

impl SimulationKernel for Simulation {
    fn step(&mut self, dt: f32, frame_index: u64) -> Result<()> {
        Simulation::step(self, dt, frame_index)
    }

    fn particles(&self) -> &ParticleArrays {
        &self.particles
    }

    fn particle_count(&self) -> usize {
        self.particles.len()
    }

    fn metrics(&self) -> StepMetrics {
        Simulation::metrics(self)
    }

    fn reset(&mut self) {
        Simulation::reset(self)
    }
}

/// Run `op` on `pool` if given, otherwise on the caller's (global) pool.
fn install<R, OP>(pool: Option<&rayon::ThreadPool>, op: OP) -> R
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

fn random_position(rng: &mut StdRng, domain: &DomainBox) -> [f32; 2] {
    let lo = domain.min_center();
    let hi = domain.max_center();
    [rng.random_range(lo..=hi[0]), rng.random_range(lo..=hi[1])]
}
