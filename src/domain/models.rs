use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StationStatus {
    Available,
    Charging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargingSession {
    pub session_id: Uuid,
    pub charger_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectAck {
    pub charger_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingSessionReport {
    pub last_session: ChargingSession,
    pub battery_level: f64,
    pub charging_cost: String,
}
