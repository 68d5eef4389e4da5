//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which manages the simulation
//! lifecycle in a background thread, including start, pause, resume, reset
//! and status tracking. The thread publishes a `FrameSnapshot` of the
//! particles every few steps so callers can read state without touching the
//! kernel.

use serde::Serialize;
use sph2d_kernel::{ParticleView, SimulationKernel, StepMetrics};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::OrchestratorError;

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (reached stopping condition)
    Finished,
    /// A step failed; the thread has exited
    Error,
}

/// Particle state published by the runner thread.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    /// Steps completed when the snapshot was taken
    pub frame_index: u64,
    /// Simulated time at the snapshot
    pub sim_time: f64,
    /// Every particle, in index order
    pub particles: Vec<ParticleView>,
    /// Aggregate statistics
    pub metrics: StepMetrics,
}

impl FrameSnapshot {
    fn capture(kernel: &dyn SimulationKernel, frame_index: u64, sim_time: f64) -> Self {
        let mut particles = Vec::with_capacity(kernel.particle_count());
        particles.extend(kernel.particles().iter());
        Self {
            frame_index,
            sim_time,
            particles,
            metrics: kernel.metrics(),
        }
    }
}

/// Shared state between the runner thread and control interface
struct SharedState {
    /// Current runner state
    state: RunnerState,
    /// Current simulation time
    sim_time: f64,
    /// Number of timesteps executed
    timestep_count: u64,
    /// Set by `request_reset`, cleared by the runner thread
    reset_requested: bool,
    /// Most recent published snapshot
    snapshot: Option<Arc<FrameSnapshot>>,
    /// Most recent error message (if state is Error)
    error_message: Option<String>,
}

fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    /// Shared state (protected by mutex)
    shared: Arc<Mutex<SharedState>>,
    /// Handle to the background thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Create a new simulation runner with the given kernel
    ///
    /// # Arguments
    /// * `kernel` - The simulation kernel to run
    /// * `dt` - Fixed timestep
    /// * `max_steps` - Optional maximum number of timesteps
    /// * `snapshot_every` - Publish a snapshot every this many steps (min 1)
    pub fn new(
        mut kernel: Box<dyn SimulationKernel + Send>,
        dt: f32,
        max_steps: Option<u64>,
        snapshot_every: u64,
    ) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            sim_time: 0.0,
            timestep_count: 0,
            reset_requested: false,
            snapshot: None,
            error_message: None,
        }));

        let shared_clone = Arc::clone(&shared);
        let snapshot_every = snapshot_every.max(1);

        // Spawn background thread
        let thread_handle = thread::spawn(move || {
            run_simulation_loop(kernel.as_mut(), shared_clone, dt, max_steps, snapshot_every);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        lock(&self.shared).state
    }

    /// Get current simulation time
    pub fn sim_time(&self) -> f64 {
        lock(&self.shared).sim_time
    }

    /// Get current timestep count
    pub fn timestep_count(&self) -> u64 {
        lock(&self.shared).timestep_count
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        lock(&self.shared).error_message.clone()
    }

    /// Most recently published snapshot, if any
    pub fn latest_snapshot(&self) -> Option<Arc<FrameSnapshot>> {
        lock(&self.shared).snapshot.clone()
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
            tracing::info!("Simulation paused at step {}", state.timestep_count);
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
            tracing::info!("Simulation resumed");
        }
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Created {
            state.state = RunnerState::Running;
            tracing::info!("Simulation started");
        }
    }

    /// Ask the runner thread to scatter the particles again and restart the
    /// step count. Takes effect before the next step, also while paused.
    pub fn request_reset(&self) {
        let mut state = lock(&self.shared);
        if matches!(state.state, RunnerState::Created | RunnerState::Running | RunnerState::Paused) {
            state.reset_requested = true;
        }
    }

    /// Stop the simulation; the thread exits after its current step
    pub fn stop(&self) {
        let mut state = lock(&self.shared);
        if matches!(state.state, RunnerState::Created | RunnerState::Running | RunnerState::Paused) {
            state.state = RunnerState::Finished;
        }
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), OrchestratorError> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| OrchestratorError::RunnerPanicked)?;
        }
        Ok(())
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Signal the thread to exit
        self.stop();
    }
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    kernel: &mut dyn SimulationKernel,
    shared: Arc<Mutex<SharedState>>,
    dt: f32,
    max_steps: Option<u64>,
    snapshot_every: u64,
) {
    let start_wall_time = Instant::now();
    let mut sim_time = 0.0_f64;
    let mut timestep_count = 0_u64;

    loop {
        // Check state, consuming a pending reset
        let (current_state, reset) = {
            let mut guard = lock(&shared);
            let reset = std::mem::take(&mut guard.reset_requested);
            (guard.state, reset)
        };

        if reset {
            kernel.reset();
            sim_time = 0.0;
            timestep_count = 0;
            let snapshot = Arc::new(FrameSnapshot::capture(kernel, 0, 0.0));
            let mut guard = lock(&shared);
            guard.sim_time = 0.0;
            guard.timestep_count = 0;
            guard.snapshot = Some(snapshot);
            tracing::info!("Simulation reset");
        }

        match current_state {
            RunnerState::Running => {
                // Execute one timestep
                if let Err(e) = kernel.step(dt, timestep_count) {
                    tracing::error!("Step {} failed: {}", timestep_count, e);
                    let snapshot = Arc::new(FrameSnapshot::capture(kernel, timestep_count, sim_time));
                    let mut guard = lock(&shared);
                    guard.state = RunnerState::Error;
                    guard.error_message = Some(e.to_string());
                    guard.snapshot = Some(snapshot);
                    break;
                }

                // Update counters
                sim_time += dt as f64;
                timestep_count += 1;

                let finished = max_steps.is_some_and(|max| timestep_count >= max);
                let snapshot = (finished || timestep_count % snapshot_every == 0)
                    .then(|| Arc::new(FrameSnapshot::capture(kernel, timestep_count, sim_time)));

                // Update shared state
                {
                    let mut guard = lock(&shared);
                    guard.sim_time = sim_time;
                    guard.timestep_count = timestep_count;
                    if snapshot.is_some() {
                        guard.snapshot = snapshot;
                    }
                    if finished {
                        guard.state = RunnerState::Finished;
                    }
                }

                // Check stopping conditions
                if finished {
                    tracing::info!("Simulation finished: reached max_steps = {}", timestep_count);
                    break;
                }

                // Log progress periodically
                if timestep_count % 100 == 0 {
                    let wall_time = start_wall_time.elapsed().as_secs_f64();
                    let metrics = kernel.metrics();
                    tracing::debug!(
                        "Step {}: sim_time={:.1}, wall_time={:.2}s, max_speed={:.3}, mean_density={:.6}",
                        timestep_count,
                        sim_time,
                        wall_time,
                        metrics.max_speed,
                        metrics.mean_density,
                    );
                }
            }
            RunnerState::Created => {
                // Wait for start signal
                thread::sleep(Duration::from_millis(10));
            }
            RunnerState::Paused => {
                // Wait while paused
                thread::sleep(Duration::from_millis(20));
            }
            RunnerState::Finished | RunnerState::Error => {
                // Exit loop
                break;
            }
        }
    }

    tracing::info!(
        "Simulation thread exiting: {} timesteps, {:.1} time units simulated",
        timestep_count,
        sim_time
    );
}
