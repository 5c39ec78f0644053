use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::metadata_http::MetadataClient;
use crate::adapters::ocpp_server;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::StationService;
use crate::domain::simulation::SimulationPolicy;
use crate::domain::station_state::{Clock, StationSession};

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn build_station_service(config: &AppConfig) -> StationService {
    StationService::new(
        StationSession::new(config.charger_id.clone()),
        Arc::new(SystemClock),
        SimulationPolicy::default().with_heartbeat_interval(config.heartbeat_interval_secs),
    )
}

fn bind_ocpp_listener(bind: &str) -> Result<StdTcpListener, AppError> {
    let listener = StdTcpListener::bind(bind)
        .map_err(|error| AppError::runtime(format!("failed to bind ocpp listener {bind}: {error}")))?;
    listener.set_nonblocking(true).map_err(AppError::runtime)?;
    Ok(listener)
}

fn build_ocpp_runtime() -> Result<tokio::runtime::Runtime, AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ocpp-worker")
        .build()
        .map_err(AppError::runtime)
}

pub fn start_ocpp_listener(
    listener: StdTcpListener,
    station: StationService,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<Result<(), AppError>>, AppError> {
    let runtime = build_ocpp_runtime()?;

    std::thread::Builder::new()
        .name("ocpp-listener".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).map_err(AppError::runtime)?;
                ocpp_server::serve(listener, station, shutdown).await;
                Ok(())
            })
        })
        .map_err(AppError::runtime)
}

fn serve_api(config: &AppConfig, station: StationService) -> Result<(), AppError> {
    let metadata = MetadataClient::new(
        &config.metadata_url,
        Duration::from_millis(config.metadata_timeout_ms),
    )
    .map_err(AppError::runtime)?;
    let api_state = ApiState { station, metadata };
    let bind = config.http_bind.clone();

    tracing::info!(bind = %bind, "http server starting");

    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .wrap(Cors::permissive())
                    .app_data(web::Data::new(api_state.clone()))
                    .configure(configure_routes)
            })
            .bind(&bind)?
            .run()
            .await
        })
        .map_err(AppError::runtime)
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let station = build_station_service(&config);
    let listener = bind_ocpp_listener(&config.ocpp_bind)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ocpp_handle = start_ocpp_listener(listener, station.clone(), shutdown_rx)?;

    let server_result = serve_api(&config, station);

    let _ = shutdown_tx.send(true);
    let ocpp_result = ocpp_handle
        .join()
        .map_err(|_| AppError::runtime("ocpp listener thread panicked"))?;

    server_result?;
    ocpp_result
}

pub fn run_api(config: AppConfig) -> Result<(), AppError> {
    let station = build_station_service(&config);
    serve_api(&config, station)
}

pub fn run_service(config: AppConfig) -> Result<(), AppError> {
    let station = build_station_service(&config);
    let listener = bind_ocpp_listener(&config.ocpp_bind)?;
    let runtime = build_ocpp_runtime()?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::from_std(listener).map_err(AppError::runtime)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
            let _ = shutdown_tx.send(true);
        });

        ocpp_server::serve(listener, station, shutdown_rx).await;
        Ok(())
    })
}
