use actix_web::{HttpResponse, Responder, get, http::StatusCode, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::metadata_http::{MetadataClient, MetadataError};
use crate::app::services::{
    ServiceError, StationCommandHandler, StationQueryHandler, StationService,
};
use crate::domain::models::ChargingSession;
use crate::domain::simulation::UiStatus;
use crate::domain::station_state::StationError;

const SUCCESS_FLAG: &str = "True";

#[derive(Clone)]
pub struct ApiState {
    pub station: StationService,
    pub metadata: MetadataClient,
}

#[derive(Debug, Deserialize)]
pub struct ChargerQuery {
    pub charger_id: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ConnectResponse {
    pub status: &'static str,
    pub charger_id: String,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StartSessionResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub session: ChargingSession,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StopSessionResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub last_session: ChargingSession,
    pub battery_level: f64,
    pub charging_cost: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UiStatusResponse<'a> {
    pub status: &'static str,
    #[serde(flatten)]
    pub ui: &'a UiStatus,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home)
        .service(health)
        .service(connect_charger_endpoint)
        .service(start_session_endpoint)
        .service(stop_session_endpoint)
        .service(status_endpoint)
        .service(charging_ui_status_endpoint)
        .service(third_party_data_endpoint);
}

#[get("/")]
async fn home() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "message": "EV Charger Simulator Running" }))
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/connect-charger")]
async fn connect_charger_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ChargerQuery>,
) -> impl Responder {
    let ack = state.station.connect(&query.charger_id);

    HttpResponse::Ok().json(ConnectResponse {
        status: SUCCESS_FLAG,
        charger_id: ack.charger_id,
        message: "Charger connected successfully.",
        timestamp: ack.timestamp,
    })
}

#[post("/start-session")]
async fn start_session_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ChargerQuery>,
) -> impl Responder {
    match state.station.start_session(&query.charger_id) {
        Ok(session) => HttpResponse::Ok().json(StartSessionResponse {
            status: SUCCESS_FLAG,
            message: "Charging started",
            session,
        }),
        Err(error) => service_error_response(error),
    }
}

#[post("/stop-session")]
async fn stop_session_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ChargerQuery>,
) -> impl Responder {
    match state.station.stop_session(&query.charger_id) {
        Ok(report) => HttpResponse::Ok().json(StopSessionResponse {
            status: SUCCESS_FLAG,
            message: "Charging stopped",
            last_session: report.last_session,
            battery_level: report.battery_level,
            charging_cost: report.charging_cost,
        }),
        Err(error) => service_error_response(error),
    }
}

#[get("/status")]
async fn status_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.station.snapshot() {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(error) => service_error_response(error),
    }
}

#[get("/charging-ui-status")]
async fn charging_ui_status_endpoint(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(UiStatusResponse {
        status: SUCCESS_FLAG,
        ui: &state.station.simulation().ui,
    })
}

#[get("/get-charger-third-party-data")]
async fn third_party_data_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.metadata.fetch().await {
        Ok(data) => HttpResponse::Ok().json(data),
        Err(error) => metadata_error_response(error),
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "detail": message.into() }))
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    match error {
        ServiceError::StationLockPoisoned => {
            tracing::error!("station state lock poisoned");
            detail(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
        ServiceError::Station(error) => {
            if let StationError::ChargerMismatch { active, requested } = &error {
                tracing::warn!(
                    active_charger_id = %active,
                    requested_charger_id = %requested,
                    "rejected stop for non-matching charger"
                );
            } else {
                tracing::warn!(error = %error, "rejected session command");
            }
            detail(StatusCode::BAD_REQUEST, error.to_string())
        }
    }
}

fn metadata_error_response(error: MetadataError) -> HttpResponse {
    tracing::error!(error = %error, "third-party metadata fetch failed");

    match &error {
        MetadataError::Request(_) | MetadataError::Unexpected(_) => {
            detail(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
        MetadataError::Upstream { status, .. } => {
            let status = StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            detail(status, error.to_string())
        }
        MetadataError::Timeout => detail(StatusCode::GATEWAY_TIMEOUT, error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, body::to_bytes, http::StatusCode, test, web};

    use crate::adapters::metadata_http::MetadataClient;
    use crate::app::services::StationService;
    use crate::domain::simulation::SimulationPolicy;
    use crate::domain::station_state::StationSession;
    use crate::test_support::{StepClock, spawn_http_responder, unused_local_addr};

    use super::{ApiState, configure_routes};

    fn build_state(metadata_url: &str, metadata_timeout: Duration) -> ApiState {
        ApiState {
            station: StationService::new(
                StationSession::new("EV123"),
                Arc::new(StepClock::starting_at(1_760_000_000_000)),
                SimulationPolicy::default(),
            ),
            metadata: MetadataClient::new(metadata_url, metadata_timeout)
                .expect("metadata client should build"),
        }
    }

    fn offline_state() -> ApiState {
        build_state(
            &format!("http://{}/posts", unused_local_addr()),
            Duration::from_secs(1),
        )
    }

    async fn read_json(resp: actix_web::dev::ServiceResponse) -> serde_json::Value {
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        serde_json::from_slice(&body).expect("body should be json")
    }

    #[actix_web::test]
    async fn home_returns_greeting() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = read_json(resp).await;
        assert_eq!(json["message"], "EV Charger Simulator Running");
    }

    #[actix_web::test]
    async fn connect_echoes_charger_id() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/connect-charger?charger_id=EV42")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = read_json(resp).await;
        assert_eq!(json["status"], "True");
        assert_eq!(json["charger_id"], "EV42");
        assert!(json["timestamp"].is_string());
    }

    #[actix_web::test]
    async fn start_without_charger_id_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/start-session").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn session_lifecycle_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/start-session?charger_id=EV123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let started = read_json(resp).await;
        assert_eq!(started["message"], "Charging started");
        assert_eq!(started["session"]["charger_id"], "EV123");

        let req = test::TestRequest::post()
            .uri("/start-session?charger_id=EV123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["detail"], "Charger is already in use");

        let req = test::TestRequest::post()
            .uri("/stop-session?charger_id=EV999")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(resp).await["detail"],
            "Charger ID does not match the active session"
        );

        let req = test::TestRequest::get().uri("/status").to_request();
        let status = read_json(test::call_service(&app, req).await).await;
        assert_eq!(status["status"], "Charging");
        assert_eq!(status["current_session"]["charger_id"], "EV123");

        let req = test::TestRequest::post()
            .uri("/stop-session?charger_id=EV123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stopped = read_json(resp).await;
        assert_eq!(stopped["message"], "Charging stopped");
        assert_eq!(stopped["battery_level"], 0.6);
        assert_eq!(stopped["charging_cost"], "$0.12");
        assert_eq!(
            stopped["last_session"]["session_id"],
            started["session"]["session_id"]
        );
        let start_time = chrono::DateTime::parse_from_rfc3339(
            stopped["last_session"]["start_time"]
                .as_str()
                .expect("start_time should be a string"),
        )
        .expect("start_time should parse");
        let end_time = chrono::DateTime::parse_from_rfc3339(
            stopped["last_session"]["end_time"]
                .as_str()
                .expect("end_time should be a string"),
        )
        .expect("end_time should parse");
        assert!(end_time >= start_time);

        let req = test::TestRequest::get().uri("/status").to_request();
        let status = read_json(test::call_service(&app, req).await).await;
        assert_eq!(status["status"], "Available");
        assert_eq!(status["current_session"], serde_json::Value::Null);

        let req = test::TestRequest::post()
            .uri("/stop-session?charger_id=EV123")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["detail"], "No active session to stop");
    }

    #[actix_web::test]
    async fn ui_status_is_constant_and_independent_of_state() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/charging-ui-status")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let json = read_json(resp).await;
        assert_eq!(json["status"], "True");
        assert_eq!(json["status_lab"], "Charging");
        assert_eq!(json["estimated_time_left"], "19 min approx");
        assert_eq!(json["map_location"]["lon"], 77.209);
    }

    #[actix_web::test]
    async fn third_party_data_passes_body_through() {
        let addr = spawn_http_responder("200 OK", r#"[{"userId":1,"id":1}]"#, None);
        let state = build_state(&format!("http://{addr}/posts"), Duration::from_secs(2));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/get-charger-third-party-data")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await[0]["userId"], 1);
    }

    #[actix_web::test]
    async fn third_party_upstream_status_is_passed_through() {
        let addr = spawn_http_responder("404 Not Found", "missing", None);
        let state = build_state(&format!("http://{addr}/posts"), Duration::from_secs(2));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/get-charger-third-party-data")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(resp).await["detail"], "HTTP error: missing");
    }

    #[actix_web::test]
    async fn third_party_timeout_maps_to_gateway_timeout() {
        let addr = spawn_http_responder("200 OK", "[]", Some(Duration::from_secs(3)));
        let state = build_state(&format!("http://{addr}/posts"), Duration::from_millis(200));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/get-charger-third-party-data")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(read_json(resp).await["detail"], "Request timed out");
    }

    #[actix_web::test]
    async fn third_party_connection_failure_maps_to_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/get-charger-third-party-data")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(resp).await;
        assert!(
            json["detail"]
                .as_str()
                .expect("detail should be a string")
                .starts_with("Request error:")
        );
    }
}
