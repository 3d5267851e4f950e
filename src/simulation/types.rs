//! Core types for the signal simulation
//!
//! Closed sets (headings, vehicle categories) and the constants shared by
//! the entity model, the scheduler and the engine.

use serde::Serialize;

/// Vehicles a single lane can hold
pub const LANE_CAPACITY: usize = 20;

/// Upper bound of a vehicle's priority score
pub const MAX_PRIORITY: f64 = 100.0;

/// Default number of metric snapshots kept in history
pub const MAX_HISTORY: usize = 100;

/// Default number of queued vehicles shown per approach in a snapshot
pub const VEHICLE_PREVIEW_LIMIT: usize = 15;

/// Simulation minutes that pass in one tick
pub const TICK_MINUTES: f64 = 1.0;

/// A unique identifier for vehicles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VehicleId(pub u64);

/// Category of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Motorcycle,
    Truck,
    Bus,
    Bicycle,
    Emergency,
}

impl VehicleType {
    pub const ALL: [VehicleType; 6] = [
        VehicleType::Car,
        VehicleType::Motorcycle,
        VehicleType::Truck,
        VehicleType::Bus,
        VehicleType::Bicycle,
        VehicleType::Emergency,
    ];

    /// Starting priority before waiting time and emergency boost
    pub fn base_priority(self) -> f64 {
        match self {
            VehicleType::Emergency => 100.0,
            VehicleType::Truck | VehicleType::Bus => 3.0,
            VehicleType::Car => 2.0,
            VehicleType::Motorcycle | VehicleType::Bicycle => 1.0,
        }
    }

    /// How much road a vehicle of this type occupies when computing density
    pub fn density_weight(self) -> f64 {
        match self {
            VehicleType::Emergency => 5.0,
            VehicleType::Truck | VehicleType::Bus => 1.5,
            VehicleType::Car => 1.0,
            VehicleType::Motorcycle => 0.7,
            VehicleType::Bicycle => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Truck => "truck",
            VehicleType::Bus => "bus",
            VehicleType::Bicycle => "bicycle",
            VehicleType::Emergency => "emergency",
        }
    }
}

/// One of the eight compass headings an approach can sit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Heading {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Heading {
    /// All headings in clockwise order starting at north
    pub const ALL: [Heading; 8] = [
        Heading::North,
        Heading::NorthEast,
        Heading::East,
        Heading::SouthEast,
        Heading::South,
        Heading::SouthWest,
        Heading::West,
        Heading::NorthWest,
    ];

    /// Compass angle in degrees
    pub fn angle(self) -> u16 {
        match self {
            Heading::North => 0,
            Heading::NorthEast => 45,
            Heading::East => 90,
            Heading::SouthEast => 135,
            Heading::South => 180,
            Heading::SouthWest => 225,
            Heading::West => 270,
            Heading::NorthWest => 315,
        }
    }

    /// Look up a heading by its angle; anything off the 45 degree grid is rejected
    pub fn from_angle(angle: u16) -> Option<Heading> {
        Heading::ALL.into_iter().find(|h| h.angle() == angle)
    }

    pub fn name(self) -> &'static str {
        match self {
            Heading::North => "NORTH",
            Heading::NorthEast => "NORTHEAST",
            Heading::East => "EAST",
            Heading::SouthEast => "SOUTHEAST",
            Heading::South => "SOUTH",
            Heading::SouthWest => "SOUTHWEST",
            Heading::West => "WEST",
            Heading::NorthWest => "NORTHWEST",
        }
    }

    /// Cardinal approaches are the wide three-lane roads
    pub fn lane_count(self) -> usize {
        if self.angle() % 90 == 0 {
            3
        } else {
            2
        }
    }
}

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Heading {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.angle())
    }
}
