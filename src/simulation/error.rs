//! Errors surfaced at the simulation's public boundary

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid heading {0}, expected one of 0, 45, ..., 315")]
    InvalidHeading(u16),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{field} out of range: {value}")]
    InvalidConfig { field: &'static str, value: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),
}

impl SimError {
    /// Validation errors are caller mistakes; everything else is a missing resource
    pub fn is_validation(&self) -> bool {
        !matches!(self, SimError::NotFound(_))
    }
}
