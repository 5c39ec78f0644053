use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::station_state::Clock;

pub struct StepClock {
    next_ms: AtomicI64,
}

impl StepClock {
    pub fn starting_at(start_ms: i64) -> Self {
        Self {
            next_ms: AtomicI64::new(start_ms),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.next_ms.fetch_add(1_000, Ordering::Relaxed);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
    }
}

pub fn spawn_http_responder(status_line: &str, body: &str, delay: Option<Duration>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("responder should bind");
    let addr = listener.local_addr().expect("addr should be available");
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let response = response.clone();
            thread::spawn(move || respond(stream, &response, delay));
        }
    });

    addr
}

pub fn unused_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("probe socket should bind");
    listener.local_addr().expect("addr should be available")
}

fn respond(mut stream: TcpStream, response: &str, delay: Option<Duration>) {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 1024];

    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut buffer) {
            Ok(0) | Err(_) => return,
            Ok(size) => request.extend_from_slice(&buffer[..size]),
        }
    }

    if let Some(delay) = delay {
        thread::sleep(delay);
    }

    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
