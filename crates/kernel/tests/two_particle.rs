//! Two-particle symmetry tests.
//!
//! Pressure accelerations on a pair must be equal and opposite, including
//! the degenerate case of two particles at the same coordinates.

use sph2d_kernel::{DomainBox, ParticleArrays, RebuildPolicy, SimParams, Simulation};

fn params() -> SimParams {
    SimParams {
        domain: DomainBox {
            max_x: 200.0,
            max_y: 200.0,
            particle_radius: 1.0,
            restitution: 0.7,
        },
        external_force: [0.0, 0.0],
        influence_radius: 20.0,
        rebuild: RebuildPolicy::EveryStep,
        ..SimParams::default()
    }
}

fn pair(a: [f32; 2], b: [f32; 2]) -> ParticleArrays {
    let mut particles = ParticleArrays::new();
    particles.push_particle(a[0], a[1]);
    particles.push_particle(b[0], b[1]);
    particles
}

fn assert_opposite(a: [f32; 2], b: [f32; 2]) {
    let scale = a[0].abs().max(a[1].abs()).max(1.0e-12);
    let tol = 1.0e-5 * scale;
    assert!(
        (a[0] + b[0]).abs() <= tol,
        "ax not equal and opposite: {} vs {}",
        a[0],
        b[0]
    );
    assert!(
        (a[1] + b[1]).abs() <= tol,
        "ay not equal and opposite: {} vs {}",
        a[1],
        b[1]
    );
}

#[test]
fn coincident_pair_stays_finite() -> sph2d_kernel::Result<()> {
    let mut sim = Simulation::new(pair([50.0, 50.0], [50.0, 50.0]), params())?;
    sim.step(1.0, 0)?;

    let p = sim.particles();
    for i in 0..2 {
        for v in [p.x[i], p.y[i], p.vx[i], p.vy[i], p.ax[i], p.ay[i], p.density[i]] {
            assert!(v.is_finite(), "particle {i} has non-finite state {v}");
        }
    }
    assert_opposite([p.ax[0], p.ay[0]], [p.ax[1], p.ay[1]]);
    Ok(())
}

#[test]
fn compressed_coincident_pair_separates() -> sph2d_kernel::Result<()> {
    // Two overlapping particles are denser than the default target, so the
    // shared pressure is positive and pushes them apart.
    let mut sim = Simulation::new(pair([50.0, 50.0], [50.0, 50.0]), params())?;
    sim.step(1.0, 0)?;

    let p = sim.particles();
    let dx = p.x[1] - p.x[0];
    let dy = p.y[1] - p.y[0];
    let dist = (dx * dx + dy * dy).sqrt();
    eprintln!("separation after one step: {dist}");
    assert!(dist > 0.0);
    Ok(())
}

#[test]
fn forces_equal_and_opposite() -> sph2d_kernel::Result<()> {
    let mut sim = Simulation::new(pair([40.0, 50.0], [50.0, 50.0]), params())?;
    sim.step(1.0, 0)?;

    let p = sim.particles();
    eprintln!("a0 = ({}, {}), a1 = ({}, {})", p.ax[0], p.ay[0], p.ax[1], p.ay[1]);
    assert_opposite([p.ax[0], p.ay[0]], [p.ax[1], p.ay[1]]);
    // Aligned on x: no y component
    assert_eq!(p.ay[0], 0.0);
    // Denser than target: repulsive
    assert!(p.ax[0] < 0.0 && p.ax[1] > 0.0);
    Ok(())
}

#[test]
fn momentum_conserved() -> sph2d_kernel::Result<()> {
    let mut sim = Simulation::new(pair([95.0, 100.0], [105.0, 101.0]), params())?;
    for frame in 0..10 {
        sim.step(1.0, frame)?;
    }

    let p = sim.particles();
    let px: f32 = p.vx.iter().sum();
    let py: f32 = p.vy.iter().sum();
    let speed = p.vx[0].abs().max(p.vy[0].abs());
    eprintln!("momentum = ({px}, {py}), particle speed = {speed}");
    assert!(speed > 0.0, "pair should have moved");
    assert!(px.abs() <= 1.0e-4 * speed, "px not conserved: {px}");
    assert!(py.abs() <= 1.0e-4 * speed, "py not conserved: {py}");
    Ok(())
}
