//! Particle data structures using struct-of-arrays layout.

use crate::error::{Error, Result};

/// Read-only copy of one particle's state, used by drawing and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParticleView {
    /// Identity index (position in the particle arrays).
    pub index: usize,
    /// Position `[x, y]`.
    pub position: [f32; 2],
    /// Velocity `[vx, vy]`.
    pub velocity: [f32; 2],
    /// Density estimated in the most recent density pass.
    pub density: f32,
}

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same
/// particle, and `i` is that particle's identity. Separate x/y arrays keep
/// the density and force passes streaming over contiguous memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleArrays {
    // ---- Positions ----
    /// X positions
    pub x: Vec<f32>,
    /// Y positions
    pub y: Vec<f32>,

    // ---- Velocities ----
    /// X velocities
    pub vx: Vec<f32>,
    /// Y velocities
    pub vy: Vec<f32>,

    // ---- Accelerations ----
    /// X pressure acceleration from the most recent force pass
    pub ax: Vec<f32>,
    /// Y pressure acceleration from the most recent force pass
    pub ay: Vec<f32>,

    /// Density, recomputed every step
    pub density: Vec<f32>,
}

impl ParticleArrays {
    /// Create an empty particle collection with no particles allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection with room for `capacity` particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            vx: Vec::with_capacity(capacity),
            vy: Vec::with_capacity(capacity),
            ax: Vec::with_capacity(capacity),
            ay: Vec::with_capacity(capacity),
            density: Vec::with_capacity(capacity),
        }
    }

    /// Return the number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a particle at rest at `(px, py)`.
    ///
    /// Velocity, acceleration and density are initialized to zero.
    pub fn push_particle(&mut self, px: f32, py: f32) {
        self.push_with_velocity(px, py, 0.0, 0.0);
    }

    /// Append a particle with an initial velocity.
    pub fn push_with_velocity(&mut self, px: f32, py: f32, vx: f32, vy: f32) {
        self.x.push(px);
        self.y.push(py);
        self.vx.push(vx);
        self.vy.push(vy);
        self.ax.push(0.0);
        self.ay.push(0.0);
        self.density.push(0.0);
    }

    /// Reserve room for `additional` more particles without aborting on
    /// allocation failure.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let requested = self.len().saturating_add(additional);
        let fail = |_| Error::Allocation { requested };
        self.x.try_reserve(additional).map_err(fail)?;
        self.y.try_reserve(additional).map_err(fail)?;
        self.vx.try_reserve(additional).map_err(fail)?;
        self.vy.try_reserve(additional).map_err(fail)?;
        self.ax.try_reserve(additional).map_err(fail)?;
        self.ay.try_reserve(additional).map_err(fail)?;
        self.density.try_reserve(additional).map_err(fail)?;
        Ok(())
    }

    /// Snapshot of particle `i`, or `None` if out of range.
    pub fn get(&self, i: usize) -> Option<ParticleView> {
        if i >= self.len() {
            return None;
        }
        Some(ParticleView {
            index: i,
            position: [self.x[i], self.y[i]],
            velocity: [self.vx[i], self.vy[i]],
            density: self.density[i],
        })
    }

    /// Iterate over snapshots of every particle in index order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = ParticleView> + '_ {
        (0..self.len()).map(move |i| ParticleView {
            index: i,
            position: [self.x[i], self.y[i]],
            velocity: [self.vx[i], self.vy[i]],
            density: self.density[i],
        })
    }

    /// Zero velocities, accelerations and densities, keeping positions.
    pub fn clear_dynamics(&mut self) {
        self.vx.fill(0.0);
        self.vy.fill(0.0);
        self.ax.fill(0.0);
        self.ay.fill(0.0);
        self.density.fill(0.0);
    }

    /// Total kinetic energy with uniform particle mass `mass`.
    pub fn kinetic_energy(&self, mass: f32) -> f64 {
        self.vx
            .iter()
            .zip(&self.vy)
            .map(|(&vx, &vy)| 0.5 * mass as f64 * (vx as f64 * vx as f64 + vy as f64 * vy as f64))
            .sum()
    }

    /// Largest particle speed, or 0 for an empty set.
    pub fn max_speed(&self) -> f32 {
        self.vx
            .iter()
            .zip(&self.vy)
            .map(|(&vx, &vy)| (vx * vx + vy * vy).sqrt())
            .fold(0.0_f32, f32::max)
    }
}
