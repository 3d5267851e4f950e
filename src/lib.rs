//! Signal Simulation Library
//!
//! Priority-driven signal control for an eight-approach intersection, with an
//! optional in-process service that ticks it in the background.

pub mod service;
pub mod simulation;
