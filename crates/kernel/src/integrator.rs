//! Semi-implicit Euler time integration.
//!
//! Velocity is updated first from the external and pressure accelerations,
//! then position moves with the new velocity. Walls and the optional
//! velocity deadband are applied last, in that order.

use crate::boundary::DomainBox;

/// Per-particle state produced by the force pass.
///
/// The force pass fills one of these per particle from a frozen view of the
/// previous state; the orchestrator copies them back once every worker is
/// done.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    /// Position after the step.
    pub position: [f32; 2],
    /// Velocity after the step.
    pub velocity: [f32; 2],
    /// Pressure acceleration used for the step.
    pub acceleration: [f32; 2],
}

/// Advance one particle by `dt`.
///
/// ```text
/// v += g * dt
/// v += a_pressure * dt
/// x += v * dt
/// ```
///
/// followed by wall resolution and the deadband.
pub fn integrate(
    state: &mut Kinematics,
    external_force: [f32; 2],
    domain: &DomainBox,
    velocity_deadband: f32,
    dt: f32,
) {
    let v = &mut state.velocity;
    v[0] += external_force[0] * dt;
    v[1] += external_force[1] * dt;
    v[0] += state.acceleration[0] * dt;
    v[1] += state.acceleration[1] * dt;

    state.position[0] += v[0] * dt;
    state.position[1] += v[1] * dt;

    domain.resolve(&mut state.position, &mut state.velocity);
    apply_deadband(&mut state.velocity, velocity_deadband);
}

/// Zero every velocity component whose magnitude is below `threshold`.
/// A threshold of 0 leaves the velocity untouched.
#[inline]
pub fn apply_deadband(velocity: &mut [f32; 2], threshold: f32) {
    for v in velocity.iter_mut() {
        if v.abs() < threshold {
            *v = 0.0;
        }
    }
}
