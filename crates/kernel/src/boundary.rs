//! Axis-aligned domain walls.
//!
//! The domain is the box `[0, max_x] x [0, max_y]`. A particle is a disc of
//! radius `particle_radius`, so its center is confined to
//! `[radius, max - radius]` on each axis. Crossing a wall clamps the center
//! and reflects that axis's velocity, scaled by the restitution factor.

use crate::error::{Error, Result};

/// Domain walls plus the collision parameters applied at them.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DomainBox {
    /// Right wall.
    pub max_x: f32,
    /// Bottom wall (y grows downward in the default gravity setup).
    pub max_y: f32,
    /// Particle collision radius.
    pub particle_radius: f32,
    /// Fraction of speed kept after a bounce, in `[0, 1]`.
    pub restitution: f32,
}

/// Which walls a particle touched during one `resolve` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WallHits {
    /// Left or right wall.
    pub x: bool,
    /// Top or bottom wall.
    pub y: bool,
}

impl DomainBox {
    /// Create a domain, checking that a particle fits inside it.
    pub fn new(max_x: f32, max_y: f32, particle_radius: f32, restitution: f32) -> Result<Self> {
        let domain = Self {
            max_x,
            max_y,
            particle_radius,
            restitution,
        };
        domain.validate()?;
        Ok(domain)
    }

    /// Check the invariants `new` enforces.
    pub fn validate(&self) -> Result<()> {
        let all_finite = [self.max_x, self.max_y, self.particle_radius, self.restitution]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::InvalidParam("domain values must be finite".into()));
        }
        if self.particle_radius < 0.0 {
            return Err(Error::InvalidParam(format!(
                "particle_radius must be >= 0, got {}",
                self.particle_radius
            )));
        }
        let diameter = 2.0 * self.particle_radius;
        if self.max_x <= diameter || self.max_y <= diameter {
            return Err(Error::InvalidParam(format!(
                "domain {}x{} is smaller than one particle diameter {}",
                self.max_x, self.max_y, diameter
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(Error::InvalidParam(format!(
                "collision_loss must be in [0, 1], got {}",
                self.restitution
            )));
        }
        Ok(())
    }

    /// Lowest allowed center coordinate on either axis.
    pub fn min_center(&self) -> f32 {
        self.particle_radius
    }

    /// Highest allowed center coordinates `[x, y]`.
    pub fn max_center(&self) -> [f32; 2] {
        [
            self.max_x - self.particle_radius,
            self.max_y - self.particle_radius,
        ]
    }

    /// `true` if `position` lies within the allowed center range.
    pub fn contains(&self, position: [f32; 2]) -> bool {
        let lo = self.min_center();
        let hi = self.max_center();
        (lo..=hi[0]).contains(&position[0]) && (lo..=hi[1]).contains(&position[1])
    }

    /// Clamp `position` into the box and reflect velocity on every axis that
    /// crossed a wall.
    pub fn resolve(&self, position: &mut [f32; 2], velocity: &mut [f32; 2]) -> WallHits {
        let lo = self.min_center();
        let hi = self.max_center();
        WallHits {
            x: resolve_axis(&mut position[0], &mut velocity[0], lo, hi[0], self.restitution),
            y: resolve_axis(&mut position[1], &mut velocity[1], lo, hi[1], self.restitution),
        }
    }
}

#[inline]
fn resolve_axis(p: &mut f32, v: &mut f32, lo: f32, hi: f32, restitution: f32) -> bool {
    if *p < lo {
        *p = lo;
    } else if *p > hi {
        *p = hi;
    } else {
        return false;
    }
    *v = -*v * restitution;
    true
}
