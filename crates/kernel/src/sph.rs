//! SPH smoothing kernels and the two per-particle operators built on them.
//!
//! Kernels are the 2-D normalized forms: a degree-3 polynomial in
//! `(r^2 - d^2)` for density, and the "spiky" kernel whose slope drives the
//! pressure force. Both integrate to 1 over the disc of radius `r`.
//!
//! The density estimator writes only each particle's own density. The
//! pressure operator only reads, so both can run over particles in any order.

use std::f32::consts::{PI, TAU};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::eos::EquationOfState;
use crate::neighbor::NeighborSearch;
use crate::particle::ParticleArrays;

/// Uniform particle mass.
pub const PARTICLE_MASS: f32 = 1.0;

/// Lower bound applied to densities before dividing by them.
pub const DENSITY_FLOOR: f32 = 1.0e-12;

/// 2-D density kernel.
///
/// ```text
/// W(r, d) = 4 / (pi r^8) * (r^2 - d^2)^3    for d < r
/// W(r, d) = 0                              otherwise
/// ```
///
/// # Arguments
/// * `radius` - Influence radius `r` (> 0).
/// * `dst` - Distance between the two points (>= 0).
#[inline]
pub fn smoothing_kernel(radius: f32, dst: f32) -> f32 {
    if dst >= radius {
        return 0.0;
    }
    let r2 = radius * radius;
    let r8 = r2 * r2 * r2 * r2;
    let v = r2 - dst * dst;
    4.0 / (PI * r8) * v * v * v
}

/// 2-D spiky kernel, `6 / (pi r^4) * (r - d)^2` inside the radius.
#[inline]
pub fn spiky_kernel(radius: f32, dst: f32) -> f32 {
    if dst >= radius {
        return 0.0;
    }
    let r2 = radius * radius;
    let v = radius - dst;
    6.0 / (PI * r2 * r2) * v * v
}

/// Magnitude of the spiky kernel's slope at `dst`.
///
/// ```text
/// |dS/dd| = 12 / (pi r^4) * (r - d)    for d < r
/// ```
///
/// Non-negative and largest at `dst = 0`. The caller supplies the direction.
#[inline]
pub fn smoothing_kernel_gradient(dst: f32, radius: f32) -> f32 {
    if dst >= radius {
        return 0.0;
    }
    let r2 = radius * radius;
    12.0 / (PI * r2 * r2) * (radius - dst)
}

// ---------------------------------------------------------------------------
// Density
// ---------------------------------------------------------------------------

/// Density sampled at an arbitrary point: `sum_j m * W(r, |point - x_j|)`
/// over every particle within the radius.
pub fn density_at(
    point: [f32; 2],
    search: NeighborSearch<'_>,
    x: &[f32],
    y: &[f32],
    radius: f32,
) -> f32 {
    let mut rho = 0.0f32;
    search.for_each_within(point, x, y, radius, |_, dst| {
        rho += PARTICLE_MASS * smoothing_kernel(radius, dst);
    });
    rho
}

/// Density of particle `i`, including its own contribution.
///
/// The self term is added explicitly rather than found through the search,
/// so it is present even when a stale grid no longer lists `i` in the
/// bucket around its current position.
pub fn particle_density(
    i: usize,
    search: NeighborSearch<'_>,
    x: &[f32],
    y: &[f32],
    radius: f32,
) -> f32 {
    let mut rho = PARTICLE_MASS * smoothing_kernel(radius, 0.0);
    search.for_each_within([x[i], y[i]], x, y, radius, |j, dst| {
        if j != i {
            rho += PARTICLE_MASS * smoothing_kernel(radius, dst);
        }
    });
    rho
}

/// Recompute `particles.density` for every particle in parallel.
pub fn compute_densities(particles: &mut ParticleArrays, search: NeighborSearch<'_>, radius: f32) {
    let ParticleArrays { x, y, density, .. } = particles;
    let (x, y) = (x.as_slice(), y.as_slice());
    density
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, rho)| *rho = particle_density(i, search, x, y, radius));
}

// ---------------------------------------------------------------------------
// Pressure force
// ---------------------------------------------------------------------------

/// Unit direction substituted for coincident particles `i` and `j`.
///
/// Deterministic for a given pair and antisymmetric:
/// `fallback_direction(i, j) == -fallback_direction(j, i)`.
pub fn fallback_direction(i: usize, j: usize) -> [f32; 2] {
    let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
    let seed = ((lo as u64) << 32) ^ (hi as u64);
    let mut rng = StdRng::seed_from_u64(seed);
    let angle: f32 = rng.random_range(0.0..TAU);
    let (s, c) = angle.sin_cos();
    if i <= j {
        [c, s]
    } else {
        [-c, -s]
    }
}

/// Pressure acceleration of particle `i`.
///
/// ```text
/// F_i = sum_{j != i} -dir_ij * |grad S(d_ij)| * P_shared(rho_i, rho_j) * m / rho_j
/// a_i = F_i / rho_i
/// ```
///
/// where `dir_ij` points from `i` to `j`. Positive shared pressure pushes the
/// pair apart and negative pressure pulls it together. Both densities are
/// clamped to `DENSITY_FLOOR` before division.
pub fn pressure_acceleration(
    i: usize,
    search: NeighborSearch<'_>,
    x: &[f32],
    y: &[f32],
    density: &[f32],
    eos: &EquationOfState,
    radius: f32,
) -> [f32; 2] {
    let (xi, yi) = (x[i], y[i]);
    let rho_i = density[i];
    let mut fx = 0.0f32;
    let mut fy = 0.0f32;

    search.for_each_within([xi, yi], x, y, radius, |j, dst| {
        if j == i {
            return;
        }
        let dir = if dst > 0.0 {
            [(x[j] - xi) / dst, (y[j] - yi) / dst]
        } else {
            fallback_direction(i, j)
        };
        let slope = smoothing_kernel_gradient(dst, radius);
        let pressure = eos.shared_pressure(rho_i, density[j]);
        let scale = slope * pressure * PARTICLE_MASS / density[j].max(DENSITY_FLOOR);
        fx -= dir[0] * scale;
        fy -= dir[1] * scale;
    });

    let rho_i = rho_i.max(DENSITY_FLOOR);
    [fx / rho_i, fy / rho_i]
}
