//! Equation of state: density to pressure.
//!
//! A linear (stiff-spring) relation around a target density. Pressure is
//! gauge pressure, zero at the target and negative (attractive) below it.

/// Default target (rest) density, in particles per unit area.
pub const DEFAULT_TARGET_DENSITY: f32 = 0.003;

/// Default stiffness multiplier.
pub const DEFAULT_PRESSURE_MULTIPLIER: f32 = 1.0;

/// Linear equation of state.
///
/// ```text
/// P = k * (rho - rho0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EquationOfState {
    /// Target density rho0.
    pub target_density: f32,
    /// Stiffness k.
    pub stiffness: f32,
}

impl Default for EquationOfState {
    fn default() -> Self {
        Self {
            target_density: DEFAULT_TARGET_DENSITY,
            stiffness: DEFAULT_PRESSURE_MULTIPLIER,
        }
    }
}

impl EquationOfState {
    /// Create an equation of state with the given target density and stiffness.
    pub fn new(target_density: f32, stiffness: f32) -> Self {
        Self {
            target_density,
            stiffness,
        }
    }

    /// Pressure for `density`. Negative when `density < target_density`.
    #[inline]
    pub fn density_to_pressure(&self, density: f32) -> f32 {
        self.stiffness * (density - self.target_density)
    }

    /// Pressure shared by a particle pair: the mean of both sides' pressures.
    ///
    /// Using one value for both directions of a pair keeps the pair force
    /// antisymmetric.
    #[inline]
    pub fn shared_pressure(&self, density_a: f32, density_b: f32) -> f32 {
        0.5 * (self.density_to_pressure(density_a) + self.density_to_pressure(density_b))
    }
}
