use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ev_charger_sim::adapters::ocpp_server::OCPP_SUBPROTOCOL;
use ev_charger_sim::domain::ocpp_frame::{Frame, FrameError};

const DEFAULT_URL: &str = "ws://127.0.0.1:9000/EV123";
const DEFAULT_HEARTBEATS: u32 = 3;
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
enum ProbeError {
    #[error("websocket error: {0}")]
    Ws(#[from] WsError),
    #[error("invalid reply frame: {0}")]
    Frame(#[from] FrameError),
    #[error("server answered {code}: {description}")]
    Rejected { code: String, description: String },
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("connection closed by server")]
    Closed,
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| DEFAULT_URL.to_string());
    let heartbeats = match args.next().map(|raw| raw.parse::<u32>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("usage: charge_point_probe [ws-url] [heartbeat-count]");
            std::process::exit(2);
        }
        None => DEFAULT_HEARTBEATS,
    };

    if let Err(err) = probe(&url, heartbeats).await {
        eprintln!("[{}] probe failed: {err}", Utc::now().to_rfc3339());
        std::process::exit(1);
    }
}

async fn probe(url: &str, heartbeats: u32) -> Result<(), ProbeError> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(OCPP_SUBPROTOCOL));

    let (mut socket, response) = tokio_tungstenite::connect_async(request).await?;
    let negotiated = response
        .headers()
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");
    println!(
        "[{}] connected to {url} (subprotocol: {negotiated})",
        Utc::now().to_rfc3339()
    );

    let boot = call(
        &mut socket,
        Frame::call(
            "boot-1",
            "BootNotification",
            json!({
                "chargePointModel": "ev-charger-sim probe",
                "chargePointVendor": "ev-charger-sim",
            }),
        ),
    )
    .await?;
    let interval = boot["interval"].as_u64().unwrap_or(10);
    println!(
        "[{}] boot {} (server time {}, heartbeat every {interval}s)",
        Utc::now().to_rfc3339(),
        boot["status"].as_str().unwrap_or("?"),
        boot["currentTime"].as_str().unwrap_or("?"),
    );

    for idx in 1..=heartbeats {
        tokio::time::sleep(Duration::from_secs(interval)).await;
        let reply = call(
            &mut socket,
            Frame::call(format!("hb-{idx}"), "Heartbeat", json!({})),
        )
        .await?;
        println!(
            "[{}] heartbeat {idx}/{heartbeats}: server time {}",
            Utc::now().to_rfc3339(),
            reply["currentTime"].as_str().unwrap_or("?"),
        );
    }

    socket.close(None).await?;
    Ok(())
}

async fn call(socket: &mut Socket, frame: Frame) -> Result<Value, ProbeError> {
    let message_id = frame.message_id().to_string();
    socket.send(Message::Text(frame.to_text().into())).await?;

    tokio::time::timeout(REPLY_TIMEOUT, await_reply(socket, &message_id))
        .await
        .map_err(|_| ProbeError::Timeout(REPLY_TIMEOUT))?
}

async fn await_reply(socket: &mut Socket, message_id: &str) -> Result<Value, ProbeError> {
    while let Some(message) = socket.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(ProbeError::Closed),
            _ => continue,
        };

        match Frame::parse(&text)? {
            Frame::CallResult {
                message_id: id,
                payload,
            } if id == message_id => return Ok(payload),
            Frame::CallError {
                message_id: id,
                code,
                description,
                ..
            } if id == message_id => {
                return Err(ProbeError::Rejected {
                    code: code.as_str().to_string(),
                    description,
                });
            }
            _ => continue,
        }
    }

    Err(ProbeError::Closed)
}
