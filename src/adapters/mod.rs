pub mod api;
pub mod metadata_http;
pub mod ocpp_server;
