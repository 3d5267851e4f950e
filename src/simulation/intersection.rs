//! The eight-way intersection
//!
//! Owns the approaches and the single green assignment.

use std::collections::BTreeMap;
use std::time::Instant;

use super::approach::SimApproach;
use super::types::Heading;

/// An eight-approach intersection with at most one green approach
#[derive(Debug, Clone)]
pub struct SimIntersection {
    pub name: String,
    approaches: BTreeMap<Heading, SimApproach>,
    current_green: Option<Heading>,
    last_switch: Instant,
}

impl SimIntersection {
    pub fn new(name: impl Into<String>, now: Instant) -> Self {
        let approaches = Heading::ALL
            .into_iter()
            .map(|heading| (heading, SimApproach::new(heading)))
            .collect();
        Self {
            name: name.into(),
            approaches,
            current_green: None,
            last_switch: now,
        }
    }

    pub fn approach(&self, heading: Heading) -> Option<&SimApproach> {
        self.approaches.get(&heading)
    }

    pub fn approach_mut(&mut self, heading: Heading) -> Option<&mut SimApproach> {
        self.approaches.get_mut(&heading)
    }

    /// Approaches in clockwise order from north
    pub fn approaches(&self) -> impl Iterator<Item = &SimApproach> {
        self.approaches.values()
    }

    pub fn approaches_mut(&mut self) -> impl Iterator<Item = &mut SimApproach> {
        self.approaches.values_mut()
    }

    pub fn current_green(&self) -> Option<Heading> {
        self.current_green
    }

    pub fn last_switch(&self) -> Instant {
        self.last_switch
    }

    /// Give `heading` right-of-way. The switch time moves with the assignment.
    pub fn set_green(&mut self, heading: Heading, now: Instant) {
        self.current_green = Some(heading);
        self.last_switch = now;
    }

    /// End the current green phase. Returns whether a phase was active.
    pub fn clear_green(&mut self) -> bool {
        self.current_green.take().is_some()
    }

    /// Whole seconds since the last switch
    pub fn seconds_since_switch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.last_switch).as_secs()
    }

    pub fn total_queued(&self) -> usize {
        self.approaches.values().map(SimApproach::len).sum()
    }

    pub fn total_capacity(&self) -> usize {
        self.approaches.values().map(|a| a.capacity).sum()
    }
}
