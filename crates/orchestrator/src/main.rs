//! Headless simulation runner
//!
//! Loads a JSON configuration, runs the simulation in the foreground and
//! reports particle metrics and whole-domain density statistics.
//!
//! Usage: `sph2d-run <config.json>`

use std::process::ExitCode;
use std::time::Instant;

use sph2d_orchestrator::{build_simulation, OrchestratorError, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Step count used when the configuration sets no `max_steps`.
const DEFAULT_STEPS: u64 = 1000;

/// Sample spacing of the final density field.
const FIELD_SPACING: f32 = 10.0;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sph2d_orchestrator=info,sph2d_kernel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(config_path) = std::env::args().nth(1) else {
        eprintln!("usage: sph2d-run <config.json>");
        return ExitCode::from(2);
    };

    match run(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> Result<(), OrchestratorError> {
    let config = SimulationConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    let mut sim = build_simulation(&config)?;
    let steps = config.max_steps.unwrap_or(DEFAULT_STEPS);

    let start = Instant::now();
    for frame in 0..steps {
        sim.step(config.dt, frame)?;
        if (frame + 1) % 100 == 0 {
            let metrics = sim.metrics();
            tracing::info!(
                "Step {}: max_speed={:.3}, mean_density={:.6}, max_density_deviation={:.3}",
                frame + 1,
                metrics.max_speed,
                metrics.mean_density,
                metrics.max_density_deviation,
            );
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    let metrics = sim.metrics();
    tracing::info!(
        "Finished {} steps in {:.2}s ({:.1} steps/s)",
        steps,
        elapsed,
        steps as f64 / elapsed.max(1e-9)
    );
    tracing::info!(
        "Final: kinetic_energy={:.3}, max_speed={:.3}, mean_density={:.6}",
        metrics.kinetic_energy,
        metrics.max_speed,
        metrics.mean_density
    );

    let density = sim.density_field(FIELD_SPACING)?.stats();
    tracing::info!(
        "Density field: min={:.6}, max={:.6}, mean={:.6}",
        density.min,
        density.max,
        density.mean
    );
    let pressure = sim.pressure_field(FIELD_SPACING)?.stats();
    tracing::info!(
        "Pressure field: min={:.6}, max={:.6}, mean={:.6}",
        pressure.min,
        pressure.max,
        pressure.mean
    );
    Ok(())
}
