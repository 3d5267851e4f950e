//! Read-only views of engine state handed to observers

use serde::Serialize;
use std::collections::BTreeMap;

use super::approach::SimApproach;
use super::metrics::{Alert, Metrics};
use super::types::VehicleType;
use super::vehicle::SimVehicle;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    pub waiting_time: f64,
    pub emergency: bool,
    pub priority: f64,
}

impl From<&SimVehicle> for VehicleView {
    fn from(vehicle: &SimVehicle) -> Self {
        Self {
            vehicle_type: vehicle.vehicle_type,
            waiting_time: vehicle.waiting_time(),
            emergency: vehicle.emergency,
            priority: vehicle.priority(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApproachState {
    pub name: String,
    pub vehicle_count: usize,
    pub density: f64,
    /// The first few vehicles in queue order
    pub vehicles: Vec<VehicleView>,
    /// Percent of capacity in use
    pub capacity_used: f64,
}

impl ApproachState {
    pub fn from_approach(approach: &SimApproach, preview_limit: usize) -> Self {
        Self {
            name: approach.name.to_string(),
            vehicle_count: approach.len(),
            density: approach.density(),
            vehicles: approach
                .vehicles()
                .take(preview_limit)
                .map(VehicleView::from)
                .collect(),
            capacity_used: approach.capacity_used(),
        }
    }
}

/// Full engine view produced after each tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub simulation_time: u64,
    /// Angle of the green approach
    pub current_green: Option<u16>,
    pub green_duration: u32,
    /// Keyed by heading angle
    pub roads: BTreeMap<u16, ApproachState>,
    pub metrics: Metrics,
    pub alerts: Vec<Alert>,
    pub queue_size: usize,
    pub is_running: bool,
}

/// Detail for a single approach
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadDetail {
    pub direction: u16,
    pub name: String,
    pub vehicle_count: usize,
    pub density: f64,
    pub capacity: usize,
    pub capacity_used: f64,
    pub lanes: usize,
    pub is_green: bool,
    /// Current scheduler score, if the approach is scheduled
    pub priority: Option<f64>,
}
