//! Fair-share priority queue over approaches
//!
//! Each approach has at most one live entry. Updating an approach pushes a
//! fresh heap entry and invalidates the old one, which is discarded lazily
//! when it reaches the top of the heap.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use super::approach::SimApproach;
use super::types::Heading;

/// Score bonus per queued emergency vehicle
pub const EMERGENCY_BOOST: f64 = 50.0;

/// Score bonus per simulation minute of the longest wait
pub const WAIT_BOOST_PER_MINUTE: f64 = 0.5;

/// Seconds after service during which an approach is penalised
pub const STARVATION_WINDOW_SECS: u64 = 60;

/// Penalty per second remaining in the starvation window
pub const STARVATION_PENALTY_PER_SEC: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Entry {
    score: OrderedFloat<f64>,
    /// Insertion order, used to break score ties in favour of the older entry
    seq: u64,
    heading: Heading,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue deciding which approach gets the next green phase
#[derive(Debug, Default)]
pub struct SignalScheduler {
    heap: BinaryHeap<Entry>,
    /// The one valid entry per approach; anything else in the heap is stale
    live: HashMap<Heading, Entry>,
    last_served: HashMap<Heading, Instant>,
    next_seq: u64,
}

impl SignalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of approaches with a live entry
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn contains(&self, heading: Heading) -> bool {
        self.live.contains_key(&heading)
    }

    /// Score of the live entry for `heading`, if any
    pub fn priority_of(&self, heading: Heading) -> Option<f64> {
        self.live.get(&heading).map(|e| e.score.into_inner())
    }

    pub fn last_served(&self, heading: Heading) -> Option<Instant> {
        self.last_served.get(&heading).copied()
    }

    /// Composite urgency of an approach; higher is served sooner.
    ///
    /// `density + emergency boost + wait boost - starvation penalty`
    pub fn score(&self, approach: &SimApproach, now: Instant) -> f64 {
        let emergency_boost = approach.emergency_count() as f64 * EMERGENCY_BOOST;
        let wait_boost = approach.max_wait() * WAIT_BOOST_PER_MINUTE;
        approach.density() + emergency_boost + wait_boost
            - self.starvation_penalty(approach.heading, now)
    }

    /// Penalty that decays linearly to zero over the minute after service
    pub fn starvation_penalty(&self, heading: Heading, now: Instant) -> f64 {
        let Some(served_at) = self.last_served.get(&heading) else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(*served_at).as_secs();
        if elapsed < STARVATION_WINDOW_SECS {
            (STARVATION_WINDOW_SECS - elapsed) as f64 * STARVATION_PENALTY_PER_SEC
        } else {
            0.0
        }
    }

    /// Insert or replace the entry for an approach with a freshly computed score
    pub fn upsert(&mut self, approach: &SimApproach, now: Instant) -> f64 {
        let score = self.score(approach, now);
        let entry = Entry {
            score: OrderedFloat(score),
            seq: self.next_seq,
            heading: approach.heading,
        };
        self.next_seq += 1;
        self.live.insert(approach.heading, entry);
        self.heap.push(entry);
        self.compact();
        score
    }

    /// Drop the live entry for an approach without serving it
    pub fn remove(&mut self, heading: Heading) -> bool {
        self.live.remove(&heading).is_some()
    }

    /// Take the highest scoring approach and mark it served at `now`
    pub fn pop(&mut self, now: Instant) -> Option<Heading> {
        while let Some(entry) = self.heap.pop() {
            let is_live = self
                .live
                .get(&entry.heading)
                .is_some_and(|live| live.seq == entry.seq);
            if !is_live {
                continue;
            }
            self.live.remove(&entry.heading);
            self.last_served.insert(entry.heading, now);
            return Some(entry.heading);
        }
        None
    }

    /// Rebuild the heap from live entries once stale ones dominate
    fn compact(&mut self) {
        if self.heap.len() > self.live.len() * 4 + 16 {
            self.heap = self.live.values().copied().collect();
        }
    }
}
