//! Vehicle waiting on an approach

use super::types::{VehicleId, VehicleType, MAX_PRIORITY};

/// A queued vehicle. No position, only how long it has been waiting.
#[derive(Debug, Clone, PartialEq)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub vehicle_type: VehicleType,
    /// Accumulated wait in simulation minutes
    waiting_time: f64,
    pub emergency: bool,
    priority: f64,
}

impl SimVehicle {
    pub fn new(id: VehicleId, vehicle_type: VehicleType, emergency: bool) -> Self {
        let mut vehicle = Self {
            id,
            vehicle_type,
            waiting_time: 0.0,
            emergency,
            priority: 0.0,
        };
        vehicle.priority = vehicle.calculate_priority();
        vehicle
    }

    /// A generated vehicle is flagged emergency exactly when its category is
    pub fn generated(id: VehicleId, vehicle_type: VehicleType) -> Self {
        Self::new(id, vehicle_type, vehicle_type == VehicleType::Emergency)
    }

    pub fn emergency(id: VehicleId) -> Self {
        Self::new(id, VehicleType::Emergency, true)
    }

    pub fn waiting_time(&self) -> f64 {
        self.waiting_time
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Add waiting time and refresh the derived priority
    pub fn wait(&mut self, minutes: f64) {
        if minutes > 0.0 {
            self.waiting_time += minutes;
        }
        self.priority = self.calculate_priority();
    }

    /// Priority is a function of category, wait and the emergency flag only
    pub fn calculate_priority(&self) -> f64 {
        let mut priority = self.vehicle_type.base_priority();
        priority += self.waiting_time * 0.5;
        if self.emergency {
            priority += 50.0;
        }
        priority.min(MAX_PRIORITY)
    }
}
