use std::env;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_base_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub default_radius_km: f64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, StoreError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            gateway_base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 15)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", 10.0)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 64)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| StoreError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
