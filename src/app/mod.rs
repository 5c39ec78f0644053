mod config;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use config::AppConfig;
pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    let config = bootstrap("simulator")?;
    runtime::run(config)
}

pub fn run_api() -> Result<(), AppError> {
    let config = bootstrap("control api")?;
    runtime::run_api(config)
}

pub fn run_service() -> Result<(), AppError> {
    let config = bootstrap("ocpp service")?;
    runtime::run_service(config)
}

fn bootstrap(mode: &str) -> Result<AppConfig, AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        mode,
        charger_id = %config.charger_id,
        http_bind = %config.http_bind,
        ocpp_bind = %config.ocpp_bind,
        metadata_url = %config.metadata_url,
        metadata_timeout_ms = config.metadata_timeout_ms,
        heartbeat_interval_secs = config.heartbeat_interval_secs,
        "application bootstrap initialized"
    );

    Ok(config)
}
