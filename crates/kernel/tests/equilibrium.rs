//! Equilibrium lattice test.
//!
//! Particles on a square lattice with the target density set to the lattice's
//! interior density. Interior particles (at least two influence radii from the
//! lattice edge) should feel almost no pressure and barely move in one step.

use sph2d_kernel::{
    smoothing_kernel, DomainBox, EquationOfState, ParticleArrays, RebuildPolicy, SimParams,
    Simulation,
};

const SPACING: f32 = 2.5;
const RADIUS: f32 = 10.0;
const SIDE: usize = 20;
const ORIGIN: f32 = 50.0;

/// Density of an infinite lattice site, by direct summation over the offsets
/// that fall inside the influence radius.
fn lattice_density() -> f32 {
    let reach = (RADIUS / SPACING).ceil() as i32;
    let mut rho = 0.0f32;
    for i in -reach..=reach {
        for j in -reach..=reach {
            let dx = i as f32 * SPACING;
            let dy = j as f32 * SPACING;
            rho += smoothing_kernel(RADIUS, (dx * dx + dy * dy).sqrt());
        }
    }
    rho
}

fn lattice() -> ParticleArrays {
    let mut particles = ParticleArrays::with_capacity(SIDE * SIDE);
    for row in 0..SIDE {
        for col in 0..SIDE {
            particles.push_particle(
                ORIGIN + col as f32 * SPACING,
                ORIGIN + row as f32 * SPACING,
            );
        }
    }
    particles
}

fn is_interior(x: f32, y: f32) -> bool {
    let lo = ORIGIN + 2.0 * RADIUS;
    let hi = ORIGIN + (SIDE - 1) as f32 * SPACING - 2.0 * RADIUS;
    (lo..=hi).contains(&x) && (lo..=hi).contains(&y)
}

#[test]
fn interior_at_target_density_is_at_rest() -> sph2d_kernel::Result<()> {
    let target = lattice_density();
    eprintln!("lattice interior density = {target}");

    let params = SimParams {
        domain: DomainBox {
            max_x: 200.0,
            max_y: 200.0,
            particle_radius: 1.0,
            restitution: 0.7,
        },
        external_force: [0.0, 0.0],
        influence_radius: RADIUS,
        eos: EquationOfState::new(target, 1.0),
        rebuild: RebuildPolicy::EveryStep,
        velocity_deadband: 0.0,
    };
    let start = lattice();
    let mut sim = Simulation::new(start.clone(), params)?;
    sim.step(1.0, 0)?;

    let p = sim.particles();
    let mut interior = 0;
    let mut max_accel = 0.0f32;
    let mut max_drift = 0.0f32;
    for i in 0..p.len() {
        if !is_interior(start.x[i], start.y[i]) {
            continue;
        }
        interior += 1;

        let rel = (p.density[i] - target).abs() / target;
        assert!(rel < 1.0e-4, "particle {i}: density {} vs target {target}", p.density[i]);

        max_accel = max_accel.max((p.ax[i] * p.ax[i] + p.ay[i] * p.ay[i]).sqrt());
        let dx = p.x[i] - start.x[i];
        let dy = p.y[i] - start.y[i];
        max_drift = max_drift.max((dx * dx + dy * dy).sqrt());
    }

    eprintln!("interior particles: {interior}, max |a| = {max_accel}, max drift = {max_drift}");
    assert!(interior > 0, "lattice has no interior");
    assert!(max_accel < 1.0e-5, "interior acceleration too large: {max_accel}");
    assert!(max_drift < 1.0e-4, "interior drift too large: {max_drift}");
    Ok(())
}

#[test]
fn edge_particles_are_pulled_inward() -> sph2d_kernel::Result<()> {
    // Edge particles see fewer neighbors, so their density is below target and
    // the (negative) pressure pulls them toward the bulk.
    let params = SimParams {
        domain: DomainBox {
            max_x: 200.0,
            max_y: 200.0,
            particle_radius: 1.0,
            restitution: 0.7,
        },
        external_force: [0.0, 0.0],
        influence_radius: RADIUS,
        eos: EquationOfState::new(lattice_density(), 1.0),
        rebuild: RebuildPolicy::EveryStep,
        velocity_deadband: 0.0,
    };
    let mut sim = Simulation::new(lattice(), params)?;
    sim.step(1.0, 0)?;

    let p = sim.particles();
    // Middle of the left edge
    let left = (SIDE / 2) * SIDE;
    eprintln!("left-edge acceleration = ({}, {})", p.ax[left], p.ay[left]);
    assert!(p.ax[left] > 0.0);
    Ok(())
}
