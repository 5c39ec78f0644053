use crate::app::AppError;
use crate::domain::simulation::DEFAULT_HEARTBEAT_INTERVAL_SECS;

const DEFAULT_METADATA_URL: &str = "https://jsonplaceholder.typicode.com/posts";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub charger_id: String,
    pub http_bind: String,
    pub ocpp_bind: String,
    pub metadata_url: String,
    pub metadata_timeout_ms: u64,
    pub heartbeat_interval_secs: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let metadata_timeout_ms = parse_or_default(&lookup, "METADATA_TIMEOUT_MS", 10_000_u64)?;
        if metadata_timeout_ms == 0 {
            return Err(AppError::config("METADATA_TIMEOUT_MS must be greater than zero"));
        }

        let heartbeat_interval_secs = parse_or_default(
            &lookup,
            "HEARTBEAT_INTERVAL_SECS",
            DEFAULT_HEARTBEAT_INTERVAL_SECS,
        )?;
        if heartbeat_interval_secs == 0 {
            return Err(AppError::config(
                "HEARTBEAT_INTERVAL_SECS must be greater than zero",
            ));
        }

        Ok(Self {
            charger_id: string_or_default(&lookup, "CHARGER_ID", "EV123"),
            http_bind: string_or_default(&lookup, "HTTP_BIND", "0.0.0.0:8000"),
            ocpp_bind: string_or_default(&lookup, "OCPP_BIND", "0.0.0.0:9000"),
            metadata_url: string_or_default(&lookup, "METADATA_URL", DEFAULT_METADATA_URL),
            metadata_timeout_ms,
            heartbeat_interval_secs,
        })
    }
}

fn string_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
