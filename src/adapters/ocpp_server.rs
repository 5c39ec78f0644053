use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::app::services::{StationQueryHandler, StationService};
use crate::domain::ocpp_frame::{CallErrorCode, Frame, salvage_message_id};

pub const OCPP_SUBPROTOCOL: &str = "ocpp1.6";
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum OcppServerError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] WsError),
    #[error("websocket transport failed: {0}")]
    Transport(#[source] WsError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootNotificationRequest {
    charge_point_model: String,
    charge_point_vendor: String,
    charge_point_serial_number: Option<String>,
    firmware_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegistrationStatus {
    Accepted,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationResponse {
    pub status: RegistrationStatus,
    pub current_time: DateTime<Utc>,
    pub interval: u32,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub current_time: DateTime<Utc>,
}

#[derive(Debug, PartialEq)]
struct CallFailure {
    code: CallErrorCode,
    description: String,
}

pub struct ChargePointHandler {
    station_id: String,
    station: StationService,
}

impl ChargePointHandler {
    pub fn new(station_id: impl Into<String>, station: StationService) -> Self {
        Self {
            station_id: station_id.into(),
            station,
        }
    }

    pub fn handle_text(&self, text: &str) -> Option<String> {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(station_id = %self.station_id, error = %error, "malformed ocpp frame");
                return salvage_message_id(text).map(|message_id| {
                    Frame::call_error(message_id, CallErrorCode::ProtocolError, error.to_string())
                        .to_text()
                });
            }
        };

        match frame {
            Frame::Call {
                message_id,
                action,
                payload,
            } => {
                let reply = match self.dispatch(&action, payload) {
                    Ok(result) => Frame::call_result(message_id, result),
                    Err(failure) => {
                        tracing::warn!(
                            station_id = %self.station_id,
                            action = %action,
                            code = failure.code.as_str(),
                            "ocpp call rejected"
                        );
                        Frame::call_error(message_id, failure.code, failure.description)
                    }
                };
                Some(reply.to_text())
            }
            other => {
                tracing::debug!(
                    station_id = %self.station_id,
                    message_id = other.message_id(),
                    "ignoring unsolicited ocpp response"
                );
                None
            }
        }
    }

    fn dispatch(&self, action: &str, payload: Value) -> Result<Value, CallFailure> {
        match action {
            "BootNotification" => {
                let request: BootNotificationRequest = parse_payload(payload)?;
                to_payload(self.on_boot_notification(request))
            }
            "Heartbeat" => to_payload(self.on_heartbeat()),
            _ => Err(CallFailure {
                code: CallErrorCode::NotImplemented,
                description: format!("no handler for {action}"),
            }),
        }
    }

    fn on_boot_notification(&self, request: BootNotificationRequest) -> BootNotificationResponse {
        let station_status = self
            .station
            .snapshot()
            .map(|snapshot| format!("{:?}", snapshot.status()))
            .unwrap_or_else(|error| error.to_string());

        tracing::info!(
            station_id = %self.station_id,
            model = %request.charge_point_model,
            vendor = %request.charge_point_vendor,
            serial_number = request.charge_point_serial_number.as_deref().unwrap_or("-"),
            firmware_version = request.firmware_version.as_deref().unwrap_or("-"),
            station_status = %station_status,
            "boot notification received"
        );

        BootNotificationResponse {
            status: RegistrationStatus::Accepted,
            current_time: self.station.now(),
            interval: self.station.simulation().heartbeat_interval_secs,
        }
    }

    fn on_heartbeat(&self) -> HeartbeatResponse {
        tracing::info!(station_id = %self.station_id, "heartbeat received");

        HeartbeatResponse {
            current_time: self.station.now(),
        }
    }
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, CallFailure> {
    serde_json::from_value(payload).map_err(|error| CallFailure {
        code: CallErrorCode::FormationViolation,
        description: error.to_string(),
    })
}

fn to_payload<T: Serialize>(response: T) -> Result<Value, CallFailure> {
    serde_json::to_value(response).map_err(|error| CallFailure {
        code: CallErrorCode::InternalError,
        description: error.to_string(),
    })
}

pub async fn serve(
    listener: TcpListener,
    station: StationService,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, subprotocol = OCPP_SUBPROTOCOL, "ocpp server listening");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let station = station.clone();
                    tokio::spawn(async move {
                        if let Err(error) = handle_connection(stream, peer, station).await {
                            tracing::warn!(peer = %peer, error = %error, "ocpp connection ended with error");
                        }
                    });
                }
                Err(error) => {
                    tracing::warn!(error = %error, "failed to accept ocpp connection");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("ocpp server stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    station: StationService,
) -> Result<(), OcppServerError> {
    let mut station_id = String::new();
    let mut subprotocol_accepted = false;

    let callback = |request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        station_id = request.uri().path().trim_matches('/').to_string();

        let offered = request
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.split(',').any(|p| p.trim() == OCPP_SUBPROTOCOL));

        if offered {
            response
                .headers_mut()
                .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(OCPP_SUBPROTOCOL));
            subprotocol_accepted = true;
        }

        Ok(response)
    };

    let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(OcppServerError::Handshake)?;

    if !subprotocol_accepted {
        tracing::warn!(
            station_id = %station_id,
            peer = %peer,
            subprotocol = OCPP_SUBPROTOCOL,
            "subprotocol not offered by client; continuing without it"
        );
    }
    tracing::info!(station_id = %station_id, peer = %peer, "charge point connected");

    let handler = ChargePointHandler::new(station_id.clone(), station);

    while let Some(message) = socket.next().await {
        match message.map_err(OcppServerError::Transport)? {
            Message::Text(text) => {
                if let Some(reply) = handler.handle_text(&text) {
                    socket
                        .send(Message::Text(reply.into()))
                        .await
                        .map_err(OcppServerError::Transport)?;
                }
            }
            Message::Binary(_) => {
                tracing::warn!(station_id = %station_id, "ignoring binary frame");
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(station_id = %station_id, peer = %peer, "charge point disconnected");
    Ok(())
}
