//! Simulation engine tests
//!
//! Time-dependent behaviour is driven through the `_at` variants so every
//! test controls the wall clock.

use signal_sim::simulation::{
    service_capacity, ConfigUpdate, Heading, Metrics, SimConfig, SimEngine, SimError, VehicleType,
};
use std::time::{Duration, Instant};

/// Engine with no random arrivals, started and ready to tick
fn quiet_engine(now: Instant) -> SimEngine {
    let mut engine = SimEngine::new_at(
        SimConfig {
            vehicle_rate: 0,
            seed: Some(7),
            ..SimConfig::default()
        },
        now,
    );
    engine.start();
    engine
}

fn queue_cars(engine: &mut SimEngine, angle: u16, count: usize, now: Instant) {
    for _ in 0..count {
        assert!(engine.enqueue_vehicle_at(angle, VehicleType::Car, now));
    }
}

fn green_count(engine: &SimEngine) -> usize {
    Heading::ALL
        .iter()
        .filter(|h| engine.road_state(h.angle()).unwrap().is_green)
        .count()
}

#[test]
fn test_new_engine_schedules_every_approach() {
    let engine = SimEngine::new_with_seed(1);
    assert_eq!(engine.scheduler().len(), 8);
    assert!(!engine.is_running());
    assert_eq!(engine.simulation_time(), 0);
    assert_eq!(engine.current_green(), None);
}

#[test]
fn test_tick_is_noop_when_stopped() {
    let mut engine = SimEngine::new_with_seed(1);
    engine.tick();
    assert_eq!(engine.simulation_time(), 0);
    assert_eq!(engine.history_len(), 0);
}

#[test]
fn test_empty_tick_without_arrivals() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);

    engine.tick_at(now);

    let metrics = engine.metrics();
    assert_eq!(metrics.total_vehicles_generated, 0);
    assert_eq!(metrics.congestion_level, 0.0);
    assert_eq!(metrics.queue_size, 8);
    assert_eq!(engine.current_green(), None);
    assert_eq!(engine.simulation_time(), 1);
    assert_eq!(engine.history_len(), 1);
}

#[test]
fn test_service_capacity_formula() {
    assert_eq!(service_capacity(3, 30), 3);
    assert_eq!(service_capacity(2, 30), 2);
    assert_eq!(service_capacity(3, 60), 6);
    assert_eq!(service_capacity(2, 10), 0);
}

#[test]
fn test_green_approach_serves_its_capacity() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 0, 10, now);
    engine.assign_green_at(0, now).unwrap();

    engine.tick_at(now);

    let north = engine.road_state(0).unwrap();
    assert_eq!(north.vehicle_count, 7);
    assert!(north.is_green);
    assert_eq!(engine.metrics().vehicles_processed, 3);
    assert_eq!(engine.metrics().total_wait_time, 0.0);
    assert_eq!(engine.metrics().co2_saved, 0.0);
}

#[test]
fn test_long_waits_count_towards_savings() {
    let t0 = Instant::now();
    let mut engine = quiet_engine(t0);
    queue_cars(&mut engine, 90, 3, t0);
    engine.assign_green_at(90, t0).unwrap();
    engine.configure(ConfigUpdate {
        green_duration: Some(10),
        ..ConfigUpdate::default()
    });

    // Three lanes at ten seconds of green clears one vehicle a tick
    for secs in 0..3 {
        engine.tick_at(t0 + Duration::from_secs(secs));
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.vehicles_processed, 3);
    // Waits were 0, 1 and 2 minutes; only the last exceeds one minute
    assert_eq!(metrics.total_wait_time, 3.0);
    assert_eq!(metrics.max_wait_time, 2.0);
    assert!((metrics.co2_saved - 0.05).abs() < 1e-9);
    assert!((metrics.fuel_saved - 0.02).abs() < 1e-9);
    assert!((metrics.avg_wait_time - 1.0).abs() < 1e-9);
}

#[test]
fn test_green_phase_expires_after_duration() {
    let t0 = Instant::now();
    let mut engine = quiet_engine(t0);
    queue_cars(&mut engine, 0, 10, t0);
    engine.assign_green_at(0, t0).unwrap();
    assert_eq!(engine.metrics().signal_changes, 1);

    engine.tick_at(t0 + Duration::from_secs(29));
    assert_eq!(engine.current_green(), Some(Heading::North));
    assert_eq!(engine.metrics().signal_changes, 1);

    let t30 = t0 + Duration::from_secs(30);
    engine.tick_at(t30);
    // Cleared, then North is still the only approach with traffic
    assert_eq!(engine.metrics().signal_changes, 3);
    assert_eq!(engine.current_green(), Some(Heading::North));
    assert_eq!(engine.intersection().last_switch(), t30);
}

#[test]
fn test_scheduler_picks_busiest_approach() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 45, 2, now);
    queue_cars(&mut engine, 180, 9, now);
    queue_cars(&mut engine, 270, 4, now);

    engine.tick_at(now);

    assert_eq!(engine.current_green(), Some(Heading::South));
    assert_eq!(engine.metrics().signal_changes, 1);
    assert_eq!(engine.metrics().queue_size, 8);
}

#[test]
fn test_emergency_preempts_busier_approach() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 0, 12, now);
    assert!(engine.inject_emergency_at(90, now));

    engine.tick_at(now);

    assert_eq!(engine.current_green(), Some(Heading::East));
}

#[test]
fn test_inject_emergency_goes_to_front() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 135, 5, now);

    assert!(engine.inject_emergency_at(135, now));

    let state = engine.snapshot();
    let road = &state.roads[&135];
    assert_eq!(road.vehicle_count, 6);
    assert!(road.vehicles[0].emergency);
    assert_eq!(road.vehicles[0].vehicle_type, VehicleType::Emergency);
    assert!(road.vehicles[1..].iter().all(|v| !v.emergency));
    assert_eq!(state.metrics.emergency_vehicles, 1);
}

#[test]
fn test_inject_emergency_rejects_bad_requests() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    assert!(!engine.inject_emergency_at(30, now));

    // NORTHEAST holds 40
    queue_cars(&mut engine, 45, 40, now);
    assert!(!engine.enqueue_vehicle_at(45, VehicleType::Car, now));
    assert!(!engine.inject_emergency_at(45, now));
    assert_eq!(engine.road_state(45).unwrap().vehicle_count, 40);
}

#[test]
fn test_assign_green_rejects_invalid_heading() {
    let mut engine = SimEngine::new_with_seed(3);
    assert_eq!(engine.assign_green(17), Err(SimError::InvalidHeading(17)));
    assert_eq!(engine.current_green(), None);
}

#[test]
fn test_road_state_unknown_heading_is_not_found() {
    let engine = SimEngine::new_with_seed(3);
    let err = engine.road_state(91).unwrap_err();
    assert!(matches!(err, SimError::NotFound(_)));
    assert!(!err.is_validation());

    let west = engine.road_state(270).unwrap();
    assert_eq!(west.name, "WEST");
    assert_eq!(west.lanes, 3);
    assert_eq!(west.capacity, 60);
    assert!(!west.is_green);
    assert!(west.priority.is_some());
}

#[test]
fn test_configure_validates_each_field() {
    let mut engine = SimEngine::new_with_seed(1);

    let applied = engine.configure(ConfigUpdate {
        green_duration: Some(5),
        ..ConfigUpdate::default()
    });
    assert_eq!(applied.green_duration, 30);
    assert_eq!(applied.rejected.len(), 1);
    assert_eq!(engine.config().green_duration_secs, 30);

    let applied = engine.configure(ConfigUpdate {
        green_duration: Some(45),
        vehicle_rate: Some(25),
        emergency_probability_pct: Some(5.0),
    });
    assert_eq!(applied.green_duration, 45);
    assert_eq!(applied.vehicle_rate, 5);
    assert!((applied.emergency_probability - 5.0).abs() < 1e-9);
    assert_eq!(applied.rejected.len(), 1);
    assert!((engine.config().emergency_probability - 0.05).abs() < 1e-12);

    let applied = engine.configure(ConfigUpdate {
        vehicle_rate: Some(20),
        emergency_probability_pct: Some(10.5),
        ..ConfigUpdate::default()
    });
    assert_eq!(applied.vehicle_rate, 20);
    assert!((applied.emergency_probability - 5.0).abs() < 1e-9);
}

#[test]
fn test_one_green_at_most_over_a_long_run() {
    let t0 = Instant::now();
    let mut engine = SimEngine::new_at(
        SimConfig {
            vehicle_rate: 12,
            seed: Some(42),
            ..SimConfig::default()
        },
        t0,
    );
    engine.start();

    for secs in 1..=300 {
        engine.tick_at(t0 + Duration::from_secs(secs));
        assert!(green_count(&engine) <= 1);
        assert_eq!(engine.scheduler().len(), 8);
    }

    let metrics = engine.metrics();
    assert!(metrics.total_vehicles_generated > 0);
    assert!(metrics.vehicles_processed > 0);
    assert!(metrics.signal_changes > 0);
    assert!(metrics.throughput > 0.0);
    assert!(metrics.system_efficiency > 0.0 && metrics.system_efficiency <= 100.0);
    let queued: usize = engine.intersection().total_queued();
    assert_eq!(
        metrics.total_vehicles_generated as usize,
        queued + metrics.vehicles_processed as usize
    );
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let t0 = Instant::now();
    let run = || {
        let mut engine = SimEngine::new_at(
            SimConfig {
                seed: Some(99),
                ..SimConfig::default()
            },
            t0,
        );
        engine.start();
        for secs in 1..=50 {
            engine.tick_at(t0 + Duration::from_secs(secs));
        }
        *engine.metrics()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_history_is_bounded() {
    let now = Instant::now();
    let mut engine = SimEngine::new_at(
        SimConfig {
            history_limit: 5,
            seed: Some(5),
            ..SimConfig::default()
        },
        now,
    );
    engine.start();
    for _ in 0..12 {
        engine.tick_at(now);
    }

    assert_eq!(engine.history_len(), 5);
    let all = engine.history(0);
    let times: Vec<u64> = all.iter().map(|s| s.simulation_time).collect();
    assert_eq!(times, vec![7, 8, 9, 10, 11]);

    let recent = engine.history(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1].simulation_time, 11);
    assert_eq!(engine.history(-3).len(), 5);
    assert_eq!(engine.history(50).len(), 5);
}

#[test]
fn test_reset_restores_baseline() {
    let t0 = Instant::now();
    let mut engine = SimEngine::new_at(
        SimConfig {
            seed: Some(11),
            ..SimConfig::default()
        },
        t0,
    );
    engine.start();
    assert!(engine.inject_emergency_at(315, t0));
    for secs in 1..=20 {
        engine.tick_at(t0 + Duration::from_secs(secs));
    }
    assert!(engine.metrics().emergency_vehicles > 0);
    assert!(engine.history_len() > 0);

    engine.reset_at(t0 + Duration::from_secs(41));

    assert!(!engine.is_running());
    assert_eq!(engine.simulation_time(), 0);
    assert_eq!(*engine.metrics(), Metrics::default());
    assert_eq!(engine.history_len(), 0);
    assert_eq!(engine.current_green(), None);
    assert_eq!(engine.scheduler().len(), 8);
    for approach in engine.intersection().approaches() {
        assert!(approach.is_empty());
        assert_eq!(approach.density(), 0.0);
    }

    // Still usable afterwards
    engine.start();
    engine.tick_at(t0 + Duration::from_secs(42));
    assert_eq!(engine.simulation_time(), 1);
}

#[test]
fn test_snapshot_preview_is_capped() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 0, 25, now);

    let state = engine.snapshot();
    assert_eq!(state.roads.len(), 8);
    let north = &state.roads[&0];
    assert_eq!(north.name, "NORTH");
    assert_eq!(north.vehicle_count, 25);
    assert_eq!(north.vehicles.len(), 15);
    assert!((north.capacity_used - 25.0 / 60.0 * 100.0).abs() < 1e-9);
    assert_eq!(state.green_duration, 30);
    assert!(state.is_running);
    assert_eq!(state.current_green, None);
}

#[test]
fn test_snapshot_serializes_to_json() {
    let now = Instant::now();
    let mut engine = quiet_engine(now);
    queue_cars(&mut engine, 225, 2, now);
    engine.assign_green_at(225, now).unwrap();

    let json = serde_json::to_value(engine.snapshot()).unwrap();
    assert_eq!(json["current_green"], 225);
    assert_eq!(json["roads"]["225"]["vehicle_count"], 2);
    assert_eq!(json["roads"]["225"]["vehicles"][0]["type"], "car");
    assert_eq!(json["metrics"]["queue_size"], 0);
    assert!(json["alerts"].is_array());
}
