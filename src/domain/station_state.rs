use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::{ChargingSession, StationStatus};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StationError {
    #[error("Charger is already in use")]
    AlreadyActive,
    #[error("No active session to stop")]
    NoActiveSession,
    #[error("Charger ID does not match the active session")]
    ChargerMismatch { active: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationSession {
    charger_id: String,
    status: StationStatus,
    current_session: Option<ChargingSession>,
}

impl StationSession {
    pub fn new(charger_id: impl Into<String>) -> Self {
        Self {
            charger_id: charger_id.into(),
            status: StationStatus::Available,
            current_session: None,
        }
    }

    pub fn charger_id(&self) -> &str {
        &self.charger_id
    }

    pub fn status(&self) -> StationStatus {
        self.status
    }

    pub fn current_session(&self) -> Option<&ChargingSession> {
        self.current_session.as_ref()
    }

    pub fn start(
        &mut self,
        charger_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ChargingSession, StationError> {
        if self.status == StationStatus::Charging {
            return Err(StationError::AlreadyActive);
        }

        let session = ChargingSession {
            session_id: Uuid::new_v4(),
            charger_id: charger_id.to_string(),
            start_time: now,
            end_time: None,
        };

        self.status = StationStatus::Charging;
        self.current_session = Some(session.clone());

        Ok(session)
    }

    pub fn stop(
        &mut self,
        charger_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ChargingSession, StationError> {
        let active = match (&self.status, &self.current_session) {
            (StationStatus::Charging, Some(session)) => session,
            _ => return Err(StationError::NoActiveSession),
        };

        if active.charger_id != charger_id {
            return Err(StationError::ChargerMismatch {
                active: active.charger_id.clone(),
                requested: charger_id.to_string(),
            });
        }

        let mut finished = self
            .current_session
            .take()
            .ok_or(StationError::NoActiveSession)?;
        // wall clock may step backwards between start and stop
        finished.end_time = Some(now.max(finished.start_time));
        self.status = StationStatus::Available;

        Ok(finished)
    }
}
