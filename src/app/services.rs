use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::{ChargingSession, ChargingSessionReport, ConnectAck};
use crate::domain::simulation::SimulationPolicy;
use crate::domain::station_state::{Clock, StationError, StationSession};

#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
    #[error("station state lock poisoned")]
    StationLockPoisoned,
    #[error(transparent)]
    Station(#[from] StationError),
}

pub trait StationQueryHandler {
    fn snapshot(&self) -> Result<StationSession, ServiceError>;
}

pub trait StationCommandHandler {
    fn connect(&self, charger_id: &str) -> ConnectAck;
    fn start_session(&self, charger_id: &str) -> Result<ChargingSession, ServiceError>;
    fn stop_session(&self, charger_id: &str) -> Result<ChargingSessionReport, ServiceError>;
}

#[derive(Clone)]
pub struct StationService {
    station: Arc<Mutex<StationSession>>,
    clock: Arc<dyn Clock>,
    simulation: Arc<SimulationPolicy>,
}

impl StationService {
    pub fn new(
        station: StationSession,
        clock: Arc<dyn Clock>,
        simulation: SimulationPolicy,
    ) -> Self {
        Self {
            station: Arc::new(Mutex::new(station)),
            clock,
            simulation: Arc::new(simulation),
        }
    }

    pub fn simulation(&self) -> &SimulationPolicy {
        &self.simulation
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn with_station<T>(
        &self,
        op: impl FnOnce(&mut StationSession, &dyn Clock) -> Result<T, StationError>,
    ) -> Result<T, ServiceError> {
        let mut station = self
            .station
            .lock()
            .map_err(|_| ServiceError::StationLockPoisoned)?;
        op(&mut station, self.clock.as_ref()).map_err(ServiceError::from)
    }
}

impl StationQueryHandler for StationService {
    fn snapshot(&self) -> Result<StationSession, ServiceError> {
        self.with_station(|station, _| Ok(station.clone()))
    }
}

impl StationCommandHandler for StationService {
    fn connect(&self, charger_id: &str) -> ConnectAck {
        ConnectAck {
            charger_id: charger_id.to_string(),
            timestamp: self.clock.now(),
        }
    }

    fn start_session(&self, charger_id: &str) -> Result<ChargingSession, ServiceError> {
        let session = self.with_station(|station, clock| station.start(charger_id, clock.now()))?;

        tracing::info!(
            charger_id = %session.charger_id,
            session_id = %session.session_id,
            "charging session started"
        );

        Ok(session)
    }

    fn stop_session(&self, charger_id: &str) -> Result<ChargingSessionReport, ServiceError> {
        let finished = self.with_station(|station, clock| station.stop(charger_id, clock.now()))?;

        tracing::info!(
            charger_id = %finished.charger_id,
            session_id = %finished.session_id,
            "charging session stopped"
        );

        Ok(ChargingSessionReport {
            last_session: finished,
            battery_level: self.simulation.stop_battery_level,
            charging_cost: self.simulation.stop_charging_cost.clone(),
        })
    }
}
