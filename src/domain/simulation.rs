use serde::Serialize;

use crate::domain::models::StationStatus;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationPolicy {
    pub heartbeat_interval_secs: u32,
    pub stop_battery_level: f64,
    pub stop_charging_cost: String,
    pub ui: UiStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiStatus {
    pub status_lab: StationStatus,
    pub battery_level: f64,
    pub estimated_time_left: String,
    pub session_duration: String,
    pub charging_cost: String,
    pub station_name: String,
    pub map_location: MapLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapLocation {
    pub lat: f64,
    pub lon: f64,
}

impl SimulationPolicy {
    pub fn with_heartbeat_interval(mut self, heartbeat_interval_secs: u32) -> Self {
        self.heartbeat_interval_secs = heartbeat_interval_secs;
        self
    }
}

impl Default for SimulationPolicy {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            stop_battery_level: 0.6,
            stop_charging_cost: "$0.12".to_string(),
            ui: UiStatus {
                status_lab: StationStatus::Charging,
                battery_level: 0.2,
                estimated_time_left: "19 min approx".to_string(),
                session_duration: "0 min ago".to_string(),
                charging_cost: "$0.00".to_string(),
                station_name: "EV Station A1".to_string(),
                map_location: MapLocation {
                    lat: 28.6139,
                    lon: 77.209,
                },
            },
        }
    }
}
