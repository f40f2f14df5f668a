// src/config/app.rs
//! Process configuration from the environment (`.env` is loaded by main).

use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use super::ai::{DEFAULT_AI_CONFIG_PATH, ENV_AI_CONFIG_PATH};

pub const ENV_JWT_SECRET: &str = "JWT_SECRET_KEY";
pub const ENV_JWT_EXPIRATION_HOURS: &str = "JWT_EXPIRATION_HOURS";
pub const ENV_DATA_PATH: &str = "FACTFLOW_DATA_PATH";
pub const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";
pub const ENV_PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";
pub const DEFAULT_JWT_EXPIRATION_HOURS: i64 = 24 * 7;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    /// JSON document store path. `None` runs on the in-memory store.
    pub data_path: Option<PathBuf>,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub ai_config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            data_path: None,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            ai_config_path: PathBuf::from(DEFAULT_AI_CONFIG_PATH),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret = match var(ENV_JWT_SECRET) {
            Some(s) if !s.trim().is_empty() => s,
            _ => {
                warn!("{ENV_JWT_SECRET} not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let data_path = var(ENV_DATA_PATH).map(PathBuf::from);
        if data_path.is_none() {
            warn!("{ENV_DATA_PATH} not set, running on the in-memory store (nothing is persisted)");
        }

        Self {
            jwt_secret,
            jwt_expiration_hours: try_load(ENV_JWT_EXPIRATION_HOURS, DEFAULT_JWT_EXPIRATION_HOURS)
                .max(1),
            data_path,
            upload_dir: var(ENV_UPLOAD_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            public_base_url: var(ENV_PUBLIC_BASE_URL)
                .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            ai_config_path: var(ENV_AI_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_AI_CONFIG_PATH)),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key` or fall back to `default`, logging which one was used.
fn try_load<T: FromStr + Display + Copy>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value `{raw}`: {e}; using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_fallbacks() {
        env::set_var(ENV_JWT_SECRET, "s3cret");
        env::set_var(ENV_JWT_EXPIRATION_HOURS, "not-a-number");
        env::set_var(ENV_PUBLIC_BASE_URL, "https://factflow.example/");
        env::remove_var(ENV_DATA_PATH);

        let cfg = AppConfig::from_env();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.jwt_expiration_hours, DEFAULT_JWT_EXPIRATION_HOURS);
        assert_eq!(cfg.public_base_url, "https://factflow.example");
        assert!(cfg.data_path.is_none());

        env::remove_var(ENV_JWT_SECRET);
        env::remove_var(ENV_JWT_EXPIRATION_HOURS);
        env::remove_var(ENV_PUBLIC_BASE_URL);

        let cfg = AppConfig::from_env();
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
    }
}
