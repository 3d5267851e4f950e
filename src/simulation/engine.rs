//! Discrete-time signal simulation
//!
//! This is the entry point for running the intersection simulation. One
//! call to [`SimEngine::tick`] advances the world by one simulation minute.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use std::time::Instant;

use super::approach::SimApproach;
use super::config::{AppliedConfig, ConfigUpdate, SimConfig, VehicleMix};
use super::error::SimError;
use super::intersection::SimIntersection;
use super::metrics::{Metrics, MetricsHistory, MetricsSnapshot};
use super::scheduler::SignalScheduler;
use super::snapshot::{ApproachState, RoadDetail, SimulationState};
use super::types::{Heading, VehicleId, VehicleType, TICK_MINUTES};
use super::vehicle::SimVehicle;

/// Chance that each admission attempt actually produces a vehicle
pub const ARRIVAL_PROBABILITY: f64 = 0.7;

/// Maximum deviation from the configured arrival rate per tick
pub const ARRIVAL_JITTER: i64 = 2;

/// Vehicles one lane can clear per minute of green
pub const VEHICLES_PER_LANE_MINUTE: usize = 2;

/// Vehicles an approach can release in one service step
pub fn service_capacity(lane_count: usize, green_duration_secs: u32) -> usize {
    // Integer division rounds down
    lane_count * VEHICLES_PER_LANE_MINUTE * green_duration_secs as usize / 60
}

/// The signal controller and everything it owns
pub struct SimEngine {
    intersection: SimIntersection,
    scheduler: SignalScheduler,
    metrics: Metrics,
    history: MetricsHistory,
    config: SimConfig,
    vehicle_mix: VehicleMix,

    /// Simulation minutes elapsed
    simulation_time: u64,
    running: bool,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
    next_vehicle_id: u64,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimEngine {
    pub fn new(config: SimConfig) -> Self {
        Self::new_at(config, Instant::now())
    }

    pub fn new_at(config: SimConfig, now: Instant) -> Self {
        let mut engine = Self {
            intersection: SimIntersection::new("8-Way Central Intersection", now),
            scheduler: SignalScheduler::new(),
            metrics: Metrics::default(),
            history: MetricsHistory::new(config.history_limit),
            vehicle_mix: VehicleMix::new(config.emergency_probability),
            rng: config.seed.map(StdRng::seed_from_u64),
            config,
            simulation_time: 0,
            running: false,
            next_vehicle_id: 0,
        };
        for approach in engine.intersection.approaches() {
            engine.scheduler.upsert(approach, now);
        }
        engine
    }

    /// Create an engine with a seeded RNG and default parameters
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new(SimConfig {
            seed: Some(seed),
            ..SimConfig::default()
        })
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    fn random_bool(&mut self, p: f64) -> bool {
        match &mut self.rng {
            Some(rng) => rng.random_bool(p),
            None => rand::rng().random_bool(p),
        }
    }

    fn choose_heading(&mut self) -> Option<Heading> {
        match &mut self.rng {
            Some(rng) => Heading::ALL.choose(rng).copied(),
            None => Heading::ALL.choose(&mut rand::rng()).copied(),
        }
    }

    fn sample_vehicle_type(&mut self) -> VehicleType {
        match &mut self.rng {
            Some(rng) => self.vehicle_mix.sample(rng),
            None => self.vehicle_mix.sample(&mut rand::rng()),
        }
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(self.next_vehicle_id);
        self.next_vehicle_id += 1;
        id
    }

    pub fn start(&mut self) {
        if !self.running {
            info!("Simulation started at t={}", self.simulation_time);
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            info!("Simulation stopped at t={}", self.simulation_time);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn simulation_time(&self) -> u64 {
        self.simulation_time
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn intersection(&self) -> &SimIntersection {
        &self.intersection
    }

    pub fn scheduler(&self) -> &SignalScheduler {
        &self.scheduler
    }

    pub fn current_green(&self) -> Option<Heading> {
        self.intersection.current_green()
    }

    /// Main simulation tick
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Run one tick as if the wall clock read `now`.
    ///
    /// Does nothing while stopped. A failing step is logged and the engine
    /// stays usable for the next tick.
    pub fn tick_at(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        if let Err(e) = self.step(now) {
            error!("Tick {} failed: {:#}", self.simulation_time, e);
        }
    }

    fn step(&mut self, now: Instant) -> Result<()> {
        let admitted = self.admit_vehicles(now);
        let served = self.serve_green(now).context("Service step failed")?;
        self.update_signal(now).context("Signal decision failed")?;
        self.update_metrics();
        self.simulation_time += 1;

        debug!(
            "t={} admitted={} served={} green={:?} queued={}",
            self.simulation_time,
            admitted,
            served,
            self.intersection.current_green(),
            self.intersection.total_queued()
        );
        Ok(())
    }

    /// Number of arrivals to attempt this tick
    fn admission_target(&mut self) -> usize {
        if self.config.vehicle_rate == 0 {
            return 0;
        }
        let jitter: i64 = self.random_range(-ARRIVAL_JITTER..=ARRIVAL_JITTER);
        (self.config.vehicle_rate as i64 + jitter).max(0) as usize
    }

    /// Generate arrivals, then rescore every approach
    fn admit_vehicles(&mut self, now: Instant) -> usize {
        let target = self.admission_target();
        let mut admitted = 0;

        for _ in 0..target {
            if !self.random_bool(ARRIVAL_PROBABILITY) {
                continue;
            }
            let Some(heading) = self.choose_heading() else {
                continue;
            };
            let has_capacity = self
                .intersection
                .approach(heading)
                .is_some_and(SimApproach::has_capacity);
            if !has_capacity {
                continue;
            }

            let vehicle_type = self.sample_vehicle_type();
            let id = self.next_vehicle_id();
            if self.admit(heading, SimVehicle::generated(id, vehicle_type)) {
                admitted += 1;
            }
        }

        for approach in self.intersection.approaches_mut() {
            approach.update_density();
            self.scheduler.upsert(approach, now);
        }
        admitted
    }

    /// Append a vehicle to the back of an approach and count it
    fn admit(&mut self, heading: Heading, vehicle: SimVehicle) -> bool {
        let Some(approach) = self.intersection.approach_mut(heading) else {
            return false;
        };
        let emergency = vehicle.emergency;
        if approach.enqueue(vehicle).is_err() {
            return false;
        }
        self.metrics.total_vehicles_generated += 1;
        if emergency {
            self.metrics.emergency_vehicles += 1;
        }
        true
    }

    /// Release vehicles from the front of the green approach
    fn serve_green(&mut self, now: Instant) -> Result<usize> {
        let Some(heading) = self.intersection.current_green() else {
            return Ok(0);
        };
        let green_secs = self.config.green_duration_secs;
        let approach = self
            .intersection
            .approach_mut(heading)
            .with_context(|| format!("Green approach {heading} not found"))?;
        if approach.is_empty() {
            return Ok(0);
        }

        let served = approach.serve(service_capacity(approach.lane_count, green_secs));
        for vehicle in &served {
            self.metrics.record_served(vehicle);
        }
        self.scheduler.upsert(approach, now);
        Ok(served.len())
    }

    /// End an expired green phase and pick the next approach if none is green
    fn update_signal(&mut self, now: Instant) -> Result<()> {
        let green_secs = u64::from(self.config.green_duration_secs);
        if let Some(heading) = self.intersection.current_green() {
            if self.intersection.seconds_since_switch(now) >= green_secs {
                self.intersection.clear_green();
                self.metrics.signal_changes += 1;
                debug!("Green phase for {heading} expired");
            }
        }

        if self.intersection.current_green().is_some() {
            return Ok(());
        }
        let Some(heading) = self.scheduler.pop(now) else {
            return Ok(());
        };

        let has_vehicles = !self
            .intersection
            .approach(heading)
            .with_context(|| format!("Scheduled approach {heading} not found"))?
            .is_empty();
        if has_vehicles {
            self.intersection.set_green(heading, now);
            self.metrics.signal_changes += 1;
            debug!("Signal switched to {heading}");
        }

        // Popped approaches go straight back in, now carrying the starvation penalty
        if let Some(approach) = self.intersection.approach(heading) {
            self.scheduler.upsert(approach, now);
        }
        Ok(())
    }

    fn update_metrics(&mut self) {
        for approach in self.intersection.approaches_mut() {
            approach.add_wait(TICK_MINUTES);
        }

        self.metrics.recompute(
            self.intersection.total_queued(),
            self.intersection.total_capacity(),
            self.simulation_time as f64 * TICK_MINUTES,
            self.scheduler.len(),
        );
        self.history
            .push(MetricsSnapshot::capture(self.metrics, self.simulation_time));
    }

    /// Stop and return to an empty intersection with zeroed metrics
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.stop();
        self.simulation_time = 0;
        self.metrics = Metrics::default();
        self.history.clear();
        for approach in self.intersection.approaches_mut() {
            approach.clear();
            self.scheduler.upsert(approach, now);
        }
        self.intersection.clear_green();
        info!("Simulation reset");
    }

    /// Apply in-range parameters; out-of-range ones are left untouched
    pub fn configure(&mut self, update: ConfigUpdate) -> AppliedConfig {
        let applied = self.config.apply(&update);
        self.vehicle_mix = VehicleMix::new(self.config.emergency_probability);

        for rejected in &applied.rejected {
            warn!("Ignoring configuration value: {rejected}");
        }
        info!(
            "Configuration: green={}s rate={}/min emergency={:.1}%",
            applied.green_duration, applied.vehicle_rate, applied.emergency_probability
        );
        applied
    }

    /// Put an emergency vehicle at the head of an approach's queue
    pub fn inject_emergency(&mut self, angle: u16) -> bool {
        self.inject_emergency_at(angle, Instant::now())
    }

    pub fn inject_emergency_at(&mut self, angle: u16, now: Instant) -> bool {
        let Some(heading) = Heading::from_angle(angle) else {
            warn!("Emergency vehicle rejected: {}", SimError::InvalidHeading(angle));
            return false;
        };
        let id = self.next_vehicle_id();
        let Some(approach) = self.intersection.approach_mut(heading) else {
            return false;
        };
        if approach.enqueue_front(SimVehicle::emergency(id)).is_err() {
            warn!("Emergency vehicle rejected: {heading} is at capacity");
            return false;
        }

        self.metrics.emergency_vehicles += 1;
        self.scheduler.upsert(approach, now);
        info!("Emergency vehicle {:?} queued at the head of {heading}", id);
        true
    }

    /// Append an ordinary arrival to an approach outside the random admission
    pub fn enqueue_vehicle(&mut self, angle: u16, vehicle_type: VehicleType) -> bool {
        self.enqueue_vehicle_at(angle, vehicle_type, Instant::now())
    }

    pub fn enqueue_vehicle_at(&mut self, angle: u16, vehicle_type: VehicleType, now: Instant) -> bool {
        let Some(heading) = Heading::from_angle(angle) else {
            warn!("Vehicle rejected: {}", SimError::InvalidHeading(angle));
            return false;
        };
        let id = self.next_vehicle_id();
        if !self.admit(heading, SimVehicle::generated(id, vehicle_type)) {
            return false;
        }
        if let Some(approach) = self.intersection.approach(heading) {
            self.scheduler.upsert(approach, now);
        }
        true
    }

    /// Operator override: give `angle` the green phase immediately
    pub fn assign_green(&mut self, angle: u16) -> Result<(), SimError> {
        self.assign_green_at(angle, Instant::now())
    }

    pub fn assign_green_at(&mut self, angle: u16, now: Instant) -> Result<(), SimError> {
        let heading = Heading::from_angle(angle).ok_or(SimError::InvalidHeading(angle))?;
        if self.intersection.current_green() != Some(heading) {
            self.intersection.set_green(heading, now);
            self.metrics.signal_changes += 1;
            info!("Signal manually switched to {heading}");
        }
        Ok(())
    }

    pub fn snapshot(&self) -> SimulationState {
        let roads = self
            .intersection
            .approaches()
            .map(|approach| {
                (
                    approach.heading.angle(),
                    ApproachState::from_approach(approach, self.config.preview_limit),
                )
            })
            .collect();

        SimulationState {
            simulation_time: self.simulation_time,
            current_green: self.intersection.current_green().map(Heading::angle),
            green_duration: self.config.green_duration_secs,
            roads,
            metrics: self.metrics,
            alerts: self.metrics.alerts(),
            queue_size: self.metrics.queue_size,
            is_running: self.running,
        }
    }

    /// Retained metric snapshots, most recent last. `limit <= 0` returns all.
    pub fn history(&self, limit: i64) -> Vec<MetricsSnapshot> {
        self.history.recent(limit)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn road_state(&self, angle: u16) -> Result<RoadDetail, SimError> {
        let approach = Heading::from_angle(angle)
            .and_then(|heading| self.intersection.approach(heading))
            .ok_or_else(|| SimError::NotFound(format!("approach at heading {angle}")))?;

        Ok(RoadDetail {
            direction: angle,
            name: approach.name.to_string(),
            vehicle_count: approach.len(),
            density: approach.density(),
            capacity: approach.capacity,
            capacity_used: approach.capacity_used(),
            lanes: approach.lane_count,
            is_green: self.intersection.current_green() == Some(approach.heading),
            priority: self.scheduler.priority_of(approach.heading),
        })
    }

    /// Print a summary of the engine state
    pub fn print_summary(&self) {
        println!("=== Signal Simulation Summary ===");
        println!(
            "Time: {} min, running: {}",
            self.simulation_time, self.running
        );
        println!(
            "Green: {}",
            self.intersection
                .current_green()
                .map_or("none".to_string(), |h| h.to_string())
        );
        println!();

        println!("--- Approaches ---");
        for approach in self.intersection.approaches() {
            let marker = if self.intersection.current_green() == Some(approach.heading) {
                '*'
            } else {
                ' '
            };
            let bar_len = (approach.capacity_used() / 5.0).round() as usize;
            println!(
                " {}{:<10} {:>3}/{:<3} density={:>6.1} |{:<20}|",
                marker,
                approach.name,
                approach.len(),
                approach.capacity,
                approach.density(),
                "#".repeat(bar_len.min(20))
            );
        }

        let m = &self.metrics;
        println!("--- Metrics ---");
        println!(
            "  Generated: {}, processed: {}, emergency: {}, signal changes: {}",
            m.total_vehicles_generated, m.vehicles_processed, m.emergency_vehicles, m.signal_changes
        );
        println!(
            "  Congestion: {:.1}%, avg wait: {:.2} min, max wait: {:.0} min",
            m.congestion_level, m.avg_wait_time, m.max_wait_time
        );
        println!(
            "  Throughput: {:.1} veh/h, efficiency: {:.1}, queue size: {}",
            m.throughput, m.system_efficiency, m.queue_size
        );
        println!(
            "  CO2 saved: {:.2} kg, fuel saved: {:.2} l",
            m.co2_saved, m.fuel_saved
        );
        for alert in m.alerts() {
            println!("  [{:?}] {}", alert.level, alert.message);
        }
    }
}
