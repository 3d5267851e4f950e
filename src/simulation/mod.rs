//! Standalone signal simulation module
//!
//! Entity model (vehicles, approaches, the intersection), the priority
//! scheduler that picks the next green approach, and the engine that runs
//! the tick loop over them. Nothing here does I/O.

mod approach;
mod config;
mod engine;
mod error;
mod intersection;
mod metrics;
mod scheduler;
mod snapshot;
mod types;
mod vehicle;

pub use approach::SimApproach;
pub use config::{
    validate_emergency_pct, validate_green_duration, validate_vehicle_rate, AppliedConfig,
    ConfigUpdate, SimConfig, VehicleMix, EMERGENCY_PCT_RANGE, GREEN_DURATION_RANGE,
    VEHICLE_RATE_RANGE,
};
pub use engine::{
    service_capacity, SimEngine, ARRIVAL_JITTER, ARRIVAL_PROBABILITY, VEHICLES_PER_LANE_MINUTE,
};
pub use error::SimError;
pub use intersection::SimIntersection;
pub use metrics::{
    efficiency_score, Alert, AlertLevel, Metrics, MetricsHistory, MetricsSnapshot,
    CO2_PER_WAIT_MINUTE, FUEL_PER_WAIT_MINUTE,
};
pub use scheduler::{
    SignalScheduler, EMERGENCY_BOOST, STARVATION_PENALTY_PER_SEC, STARVATION_WINDOW_SECS,
    WAIT_BOOST_PER_MINUTE,
};
pub use snapshot::{ApproachState, RoadDetail, SimulationState, VehicleView};
pub use types::{
    Heading, VehicleId, VehicleType, LANE_CAPACITY, MAX_HISTORY, MAX_PRIORITY, TICK_MINUTES,
    VEHICLE_PREVIEW_LIMIT,
};
pub use vehicle::SimVehicle;
