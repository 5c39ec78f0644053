pub mod models;
pub mod ocpp_frame;
pub mod simulation;
pub mod station_state;
