//! Simulation parameters and their runtime validation

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::Serialize;
use std::ops::RangeInclusive;

use super::error::SimError;
use super::types::{VehicleType, MAX_HISTORY, VEHICLE_PREVIEW_LIMIT};

pub const GREEN_DURATION_RANGE: RangeInclusive<i64> = 10..=60;
pub const VEHICLE_RATE_RANGE: RangeInclusive<i64> = 1..=20;
pub const EMERGENCY_PCT_RANGE: RangeInclusive<f64> = 0.0..=10.0;

/// Parameters the engine runs with
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Length of a green phase in seconds
    pub green_duration_secs: u32,
    /// Vehicles arriving per simulation minute
    pub vehicle_rate: u32,
    /// Share of generated vehicles that are emergency vehicles, 0.0..=1.0
    pub emergency_probability: f64,
    /// Seed for reproducible runs; entropy-seeded when absent
    pub seed: Option<u64>,
    pub history_limit: usize,
    pub preview_limit: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            green_duration_secs: 30,
            vehicle_rate: 5,
            emergency_probability: 0.02,
            seed: None,
            history_limit: MAX_HISTORY,
            preview_limit: VEHICLE_PREVIEW_LIMIT,
        }
    }
}

/// Requested changes; `None` leaves a parameter alone
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigUpdate {
    pub green_duration: Option<i64>,
    pub vehicle_rate: Option<i64>,
    pub emergency_probability_pct: Option<f64>,
}

/// Configuration in effect after an update, plus any values that were ignored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedConfig {
    pub green_duration: u32,
    pub vehicle_rate: u32,
    pub emergency_probability: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<String>,
}

pub fn validate_green_duration(secs: i64) -> Result<u32, SimError> {
    if GREEN_DURATION_RANGE.contains(&secs) {
        Ok(secs as u32)
    } else {
        Err(SimError::InvalidConfig {
            field: "green_duration",
            value: secs.to_string(),
        })
    }
}

pub fn validate_vehicle_rate(rate: i64) -> Result<u32, SimError> {
    if VEHICLE_RATE_RANGE.contains(&rate) {
        Ok(rate as u32)
    } else {
        Err(SimError::InvalidConfig {
            field: "vehicle_rate",
            value: rate.to_string(),
        })
    }
}

/// Percentage in, fraction out
pub fn validate_emergency_pct(pct: f64) -> Result<f64, SimError> {
    if EMERGENCY_PCT_RANGE.contains(&pct) {
        Ok(pct / 100.0)
    } else {
        Err(SimError::InvalidConfig {
            field: "emergency_probability",
            value: pct.to_string(),
        })
    }
}

impl SimConfig {
    /// Apply each field independently. Out-of-range fields are skipped and
    /// reported in `rejected`.
    pub fn apply(&mut self, update: &ConfigUpdate) -> AppliedConfig {
        let mut rejected = Vec::new();

        if let Some(secs) = update.green_duration {
            match validate_green_duration(secs) {
                Ok(secs) => self.green_duration_secs = secs,
                Err(e) => rejected.push(e.to_string()),
            }
        }
        if let Some(rate) = update.vehicle_rate {
            match validate_vehicle_rate(rate) {
                Ok(rate) => self.vehicle_rate = rate,
                Err(e) => rejected.push(e.to_string()),
            }
        }
        if let Some(pct) = update.emergency_probability_pct {
            match validate_emergency_pct(pct) {
                Ok(p) => self.emergency_probability = p,
                Err(e) => rejected.push(e.to_string()),
            }
        }

        AppliedConfig {
            rejected,
            ..self.applied()
        }
    }

    pub fn applied(&self) -> AppliedConfig {
        AppliedConfig {
            green_duration: self.green_duration_secs,
            vehicle_rate: self.vehicle_rate,
            emergency_probability: self.emergency_probability * 100.0,
            rejected: Vec::new(),
        }
    }
}

/// Weighted category distribution for generated vehicles
#[derive(Debug, Clone)]
pub struct VehicleMix {
    weights: [f64; 6],
    dist: Option<WeightedIndex<f64>>,
}

impl VehicleMix {
    /// Fixed shares for ordinary traffic, emergency share as configured.
    /// Weights follow the order of `VehicleType::ALL`.
    pub fn new(emergency_share: f64) -> Self {
        let emergency = if emergency_share.is_finite() {
            emergency_share.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let weights = [0.55, 0.15, 0.10, 0.08, 0.10, emergency];
        Self {
            weights,
            dist: WeightedIndex::new(weights).ok(),
        }
    }

    pub fn weight(&self, vehicle_type: VehicleType) -> f64 {
        VehicleType::ALL
            .iter()
            .position(|t| *t == vehicle_type)
            .map_or(0.0, |i| self.weights[i])
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> VehicleType {
        match &self.dist {
            Some(dist) => VehicleType::ALL[dist.sample(rng)],
            None => VehicleType::Car,
        }
    }
}

impl Default for VehicleMix {
    fn default() -> Self {
        Self::new(SimConfig::default().emergency_probability)
    }
}
