//! Approach (incoming road) of the intersection
//!
//! Holds the FIFO queue of waiting vehicles and the derived density score.

use std::collections::VecDeque;

use super::error::SimError;
use super::types::{Heading, LANE_CAPACITY};
use super::vehicle::SimVehicle;

/// One of the eight roads feeding the intersection
#[derive(Debug, Clone)]
pub struct SimApproach {
    pub heading: Heading,
    pub name: &'static str,
    pub lane_count: usize,
    pub capacity: usize,
    /// Front of the queue is the next vehicle through
    queue: VecDeque<SimVehicle>,
    density: f64,
}

impl SimApproach {
    pub fn new(heading: Heading) -> Self {
        let lane_count = heading.lane_count();
        Self {
            heading,
            name: heading.name(),
            lane_count,
            capacity: lane_count * LANE_CAPACITY,
            queue: VecDeque::new(),
            density: 0.0,
        }
    }

    /// Build an approach from a raw compass angle
    pub fn from_angle(angle: u16) -> Result<Self, SimError> {
        Heading::from_angle(angle)
            .map(Self::new)
            .ok_or(SimError::InvalidHeading(angle))
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.queue.len() < self.capacity
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> {
        self.queue.iter()
    }

    /// Percentage of capacity currently occupied
    pub fn capacity_used(&self) -> f64 {
        self.queue.len() as f64 / self.capacity as f64 * 100.0
    }

    /// Append a vehicle at the back of the queue.
    /// Returns the vehicle back if the approach is full.
    pub fn enqueue(&mut self, vehicle: SimVehicle) -> Result<(), SimVehicle> {
        if !self.has_capacity() {
            return Err(vehicle);
        }
        self.queue.push_back(vehicle);
        self.update_density();
        Ok(())
    }

    /// Put a vehicle at the head of the queue, ahead of everyone already waiting
    pub fn enqueue_front(&mut self, vehicle: SimVehicle) -> Result<(), SimVehicle> {
        if !self.has_capacity() {
            return Err(vehicle);
        }
        self.queue.push_front(vehicle);
        self.update_density();
        Ok(())
    }

    /// Release up to `count` vehicles from the front, in queue order
    pub fn serve(&mut self, count: usize) -> Vec<SimVehicle> {
        let count = count.min(self.queue.len());
        let served: Vec<SimVehicle> = self.queue.drain(..count).collect();
        self.update_density();
        served
    }

    /// Advance every queued vehicle's wait
    pub fn add_wait(&mut self, minutes: f64) {
        for vehicle in &mut self.queue {
            vehicle.wait(minutes);
        }
        self.update_density();
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.density = 0.0;
    }

    pub fn emergency_count(&self) -> usize {
        self.queue.iter().filter(|v| v.emergency).count()
    }

    /// Longest wait in the queue, 0 when empty
    pub fn max_wait(&self) -> f64 {
        self.queue
            .iter()
            .map(SimVehicle::waiting_time)
            .fold(0.0, f64::max)
    }

    pub fn total_wait(&self) -> f64 {
        self.queue.iter().map(SimVehicle::waiting_time).sum()
    }

    /// Recompute density from the queue contents.
    ///
    /// Three contributions, scaled to a percentage:
    /// - occupancy (`len / capacity`)
    /// - type-weighted occupancy (`sum(weight) / (2 * capacity)`)
    /// - accumulated wait (`sum(wait) / 100`, capped at 0.3)
    pub fn update_density(&mut self) -> f64 {
        if self.queue.is_empty() {
            self.density = 0.0;
            return self.density;
        }

        let capacity = self.capacity as f64;
        let base = self.queue.len() as f64 / capacity;
        let weighted: f64 = self
            .queue
            .iter()
            .map(|v| v.vehicle_type.density_weight())
            .sum();
        let type_density = weighted / (capacity * 2.0);
        let wait_density = (self.total_wait() / 100.0).min(0.3);

        self.density = (base + type_density + wait_density) * 100.0;
        self.density
    }
}
