//! Operator actions and the payloads returned for them

use serde::Serialize;
use std::str::FromStr;

use crate::simulation::{MetricsSnapshot, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    /// Same as stop
    Pause,
    /// Reset and start again
    Reset,
}

impl FromStr for ControlAction {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(ControlAction::Start),
            "stop" => Ok(ControlAction::Stop),
            "pause" => Ok(ControlAction::Pause),
            "reset" => Ok(ControlAction::Reset),
            _ => Err(SimError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyResponse {
    pub success: bool,
    pub direction: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<MetricsSnapshot>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub simulation_running: bool,
    pub simulation_time: u64,
    pub active_connections: usize,
}
