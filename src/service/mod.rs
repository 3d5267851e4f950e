//! In-process service around the engine
//!
//! Drives ticks on a fixed cadence from one background thread, fans the
//! resulting snapshot out to observers, and serializes operator requests
//! against the running tick through a single lock.

mod control;
mod observers;

pub use control::{ControlAction, ControlResponse, EmergencyResponse, HealthStatus, HistoryResponse};
pub use observers::{ObserverId, ObserverRegistry, OBSERVER_BUFFER};

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::simulation::{
    AppliedConfig, ConfigUpdate, RoadDetail, SimEngine, SimError, SimulationState,
};

/// One tick per wall-clock second
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Engine handle shared between the tick loop and request handlers
pub type SharedEngine = Arc<Mutex<SimEngine>>;

fn lock(engine: &SharedEngine) -> MutexGuard<'_, SimEngine> {
    // A panic mid-tick leaves the engine consistent enough to keep ticking
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulationService {
    engine: SharedEngine,
    observers: Arc<ObserverRegistry>,
    interval: Duration,
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl SimulationService {
    pub fn new(engine: SimEngine, interval: Duration) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            observers: Arc::new(ObserverRegistry::new()),
            interval,
            worker: None,
        }
    }

    pub fn engine(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    pub fn is_looping(&self) -> bool {
        self.worker.is_some()
    }

    /// Start the background tick loop. Calling it twice is a no-op.
    pub fn spawn(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let (stop_tx, stop_rx) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let observers = Arc::clone(&self.observers);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("signal-sim-ticker".to_string())
            .spawn(move || run_loop(engine, observers, interval, stop_rx))
            .context("Failed to spawn tick loop thread")?;
        self.worker = Some((stop_tx, handle));
        info!("Tick loop running every {:?}", self.interval);
        Ok(())
    }

    /// Stop the background loop and wait for it to exit
    pub fn shutdown(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                error!("Tick loop thread panicked during shutdown");
            }
            info!("Tick loop stopped");
        }
    }

    /// Run one tick and broadcast the result, outside the background loop
    pub fn tick_once(&self) -> SimulationState {
        let state = {
            let mut engine = lock(&self.engine);
            engine.tick();
            engine.snapshot()
        };
        broadcast_state(&self.observers, &state);
        state
    }

    pub fn control(&self, action: &str) -> Result<ControlResponse, SimError> {
        let action = action.parse::<ControlAction>().inspect_err(|e| warn!("{e}"))?;
        let mut engine = lock(&self.engine);
        let message = match action {
            ControlAction::Start => {
                engine.start();
                "Simulation started"
            }
            ControlAction::Stop => {
                engine.stop();
                "Simulation stopped"
            }
            ControlAction::Pause => {
                engine.stop();
                "Simulation paused"
            }
            ControlAction::Reset => {
                engine.reset();
                engine.start();
                "Simulation reset and started"
            }
        };
        Ok(ControlResponse {
            success: true,
            message: message.to_string(),
        })
    }

    pub fn configure(&self, update: ConfigUpdate) -> AppliedConfig {
        lock(&self.engine).configure(update)
    }

    pub fn inject_emergency(&self, direction: u16) -> EmergencyResponse {
        let success = lock(&self.engine).inject_emergency(direction);
        let message = if success {
            "Emergency vehicle added successfully"
        } else {
            "Failed to add emergency vehicle"
        };
        EmergencyResponse {
            success,
            direction,
            message: message.to_string(),
        }
    }

    pub fn state(&self) -> SimulationState {
        lock(&self.engine).snapshot()
    }

    pub fn history(&self, limit: i64) -> HistoryResponse {
        let engine = lock(&self.engine);
        HistoryResponse {
            history: engine.history(limit),
            count: engine.history_len(),
        }
    }

    pub fn road_state(&self, direction: u16) -> Result<RoadDetail, SimError> {
        lock(&self.engine).road_state(direction)
    }

    pub fn health(&self) -> HealthStatus {
        let (running, simulation_time) = {
            let engine = lock(&self.engine);
            (engine.is_running(), engine.simulation_time())
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        HealthStatus {
            status: "healthy",
            timestamp,
            simulation_running: running,
            simulation_time,
            active_connections: self.observers.len(),
        }
    }

    /// Register an observer; it receives the current state straight away
    pub fn subscribe(&self) -> (ObserverId, Receiver<String>) {
        let (id, receiver) = self.observers.register();
        match serde_json::to_string(&self.state()) {
            Ok(json) => {
                self.observers.send_to(id, json);
            }
            Err(e) => error!("Failed to serialize initial state: {e}"),
        }
        (id, receiver)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }
}

impl Drop for SimulationService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn broadcast_state(observers: &ObserverRegistry, state: &SimulationState) {
    if observers.is_empty() {
        return;
    }
    match serde_json::to_string(state) {
        Ok(json) => {
            observers.broadcast(&json);
        }
        Err(e) => error!("Failed to serialize state: {e}"),
    }
}

/// Tick, broadcast, sleep out the rest of the interval. A failed tick is
/// logged and the next one still runs.
fn run_loop(
    engine: SharedEngine,
    observers: Arc<ObserverRegistry>,
    interval: Duration,
    stop: Receiver<()>,
) {
    loop {
        let started = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut engine = lock(&engine);
            engine.tick();
            engine.snapshot()
        }));
        match result {
            Ok(state) => broadcast_state(&observers, &state),
            Err(_) => error!("Simulation tick panicked; continuing with the next tick"),
        }

        let wait = interval.saturating_sub(started.elapsed());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
