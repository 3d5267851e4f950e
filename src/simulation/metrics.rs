//! Aggregate metrics and their bounded history

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use super::vehicle::SimVehicle;

/// kg of CO2 attributed to each minute a served vehicle waited
pub const CO2_PER_WAIT_MINUTE: f64 = 0.025;

/// Litres of fuel attributed to each minute a served vehicle waited
pub const FUEL_PER_WAIT_MINUTE: f64 = 0.01;

/// Throughput (veh/h) that counts as a perfect score
pub const TARGET_THROUGHPUT: f64 = 500.0;

/// Point-in-time metric values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_vehicles_generated: u64,
    pub vehicles_processed: u64,
    pub total_wait_time: f64,
    pub avg_wait_time: f64,
    pub max_wait_time: f64,
    pub emergency_vehicles: u64,
    pub signal_changes: u64,
    /// Percent of total capacity occupied
    pub congestion_level: f64,
    pub co2_saved: f64,
    pub fuel_saved: f64,
    /// Vehicles per hour
    pub throughput: f64,
    pub queue_size: usize,
    pub system_efficiency: f64,
}

impl Metrics {
    /// Account for a vehicle leaving through a green phase
    pub fn record_served(&mut self, vehicle: &SimVehicle) {
        let wait = vehicle.waiting_time();
        self.vehicles_processed += 1;
        self.total_wait_time += wait;
        self.max_wait_time = self.max_wait_time.max(wait);

        // Short waits are not counted as savings
        if wait > 1.0 {
            self.co2_saved += wait * CO2_PER_WAIT_MINUTE;
            self.fuel_saved += wait * FUEL_PER_WAIT_MINUTE;
        }
    }

    /// Recompute the derived fields from the running totals
    pub fn recompute(
        &mut self,
        queued: usize,
        capacity: usize,
        elapsed_minutes: f64,
        queue_size: usize,
    ) {
        self.congestion_level = if capacity > 0 {
            queued as f64 / capacity as f64 * 100.0
        } else {
            0.0
        };
        self.avg_wait_time = if self.vehicles_processed > 0 {
            self.total_wait_time / self.vehicles_processed as f64
        } else {
            0.0
        };
        self.throughput = if elapsed_minutes > 0.0 {
            self.vehicles_processed as f64 / elapsed_minutes * 60.0
        } else {
            0.0
        };
        self.queue_size = queue_size;
        self.system_efficiency =
            efficiency_score(self.congestion_level, self.avg_wait_time, self.throughput);
    }

    /// Conditions an operator should look at
    pub fn alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        if self.congestion_level >= 80.0 {
            alerts.push(Alert::new(
                AlertLevel::Critical,
                format!("High congestion: {:.1}%", self.congestion_level),
            ));
        }
        if self.avg_wait_time > 10.0 {
            alerts.push(Alert::new(
                AlertLevel::Warning,
                format!("High wait time: {:.1} min", self.avg_wait_time),
            ));
        }
        if self.emergency_vehicles > 0 {
            alerts.push(Alert::new(
                AlertLevel::Info,
                format!("{} emergency vehicle(s) active", self.emergency_vehicles),
            ));
        }
        if self.throughput < 100.0 {
            alerts.push(Alert::new(
                AlertLevel::Warning,
                format!("Low throughput: {:.0} veh/hr", self.throughput),
            ));
        }
        alerts
    }
}

/// Weighted blend of free capacity (40%), short waits (40%) and throughput (20%)
pub fn efficiency_score(congestion: f64, avg_wait: f64, throughput: f64) -> f64 {
    let congestion_factor = (100.0 - congestion).max(0.0);
    let wait_factor = (10.0 - avg_wait.min(10.0)).max(0.0) * 10.0;
    let throughput_factor = (throughput / TARGET_THROUGHPUT * 100.0).min(100.0);
    congestion_factor * 0.4 + wait_factor * 0.4 + throughput_factor * 0.2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    fn new(level: AlertLevel, message: String) -> Self {
        Self { level, message }
    }
}

/// Metrics captured at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub simulation_time: u64,
    #[serde(flatten)]
    pub metrics: Metrics,
}

impl MetricsSnapshot {
    pub fn capture(metrics: Metrics, simulation_time: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            timestamp,
            simulation_time,
            metrics,
        }
    }
}

/// Fixed-size record of recent snapshots, oldest evicted first
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    entries: VecDeque<MetricsSnapshot>,
    limit: usize,
}

impl MetricsHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, snapshot: MetricsSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&MetricsSnapshot> {
        self.entries.back()
    }

    /// Up to `limit` most recent entries, oldest first. `limit <= 0` means all.
    pub fn recent(&self, limit: i64) -> Vec<MetricsSnapshot> {
        let skip = if limit <= 0 {
            0
        } else {
            self.entries.len().saturating_sub(limit as usize)
        };
        self.entries.iter().skip(skip).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_of_idle_intersection() {
        // Empty, no waits, no throughput
        assert_eq!(efficiency_score(0.0, 0.0, 0.0), 80.0);
        assert_eq!(efficiency_score(100.0, 25.0, 1000.0), 20.0);
    }

    #[test]
    fn alerts_follow_thresholds() {
        let metrics = Metrics {
            congestion_level: 85.0,
            avg_wait_time: 12.0,
            throughput: 150.0,
            ..Metrics::default()
        };
        let levels: Vec<AlertLevel> = metrics.alerts().iter().map(|a| a.level).collect();
        assert_eq!(levels, vec![AlertLevel::Critical, AlertLevel::Warning]);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = MetricsHistory::new(3);
        for t in 0..5 {
            history.push(MetricsSnapshot::capture(Metrics::default(), t));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.recent(0)[0].simulation_time, 2);
        assert_eq!(history.latest().map(|s| s.simulation_time), Some(4));
    }
}
