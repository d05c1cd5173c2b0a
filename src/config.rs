use anyhow::Result;
use config::{Config, Environment, File};
use moka::future::Cache;
use sea_orm::{ConnectOptions, Database};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::AuthKeys;
use crate::schemas::AppState;
use crate::throttle::Throttles;

/// Request-rate ceilings, each written as `N/s|m|h|d`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Master switch; when false no throttle is applied
    pub enabled: bool,
    /// Global ceiling for anonymous clients
    pub anon: String,
    /// Global ceiling for authenticated clients
    pub auth: String,
    /// Anonymous ceiling on the demo routes
    pub simple: String,
    /// Anonymous ceiling on sign-in and registration, reads exempt
    pub no_reads: String,
    /// Authenticated ceiling on POSTs to write routes
    pub strict_post: String,
    /// Authenticated daily ceiling
    pub daily: String,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            anon: "10/m".to_string(),
            auth: "10/m".to_string(),
            simple: "10/s".to_string(),
            no_reads: "100/m".to_string(),
            strict_post: "50/m".to_string(),
            daily: "10000/d".to_string(),
        }
    }
}

/// Application settings: defaults, then an optional config file, then
/// `LMS__*` environment variables (e.g. `LMS__THROTTLE__ENABLED=false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    /// Tokio worker threads
    pub workers: usize,
    pub request_timeout_secs: u64,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level: String,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    /// Lifetime of cached statistics
    pub cache_ttl_secs: u64,
    pub throttle: ThrottleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://lms.db?mode=rwc".to_string(),
            bind_address: "127.0.0.1:8000".to_string(),
            workers: 3,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            jwt_secret: "change-me-in-production".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 7,
            cache_ttl_secs: 300,
            throttle: ThrottleSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings, reading `.env` first so its variables take part.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("LMS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

/// Initialize application state against the configured database
pub async fn initialize_app_state(settings: &Settings) -> Result<AppState> {
    initialize_app_state_with_url(&settings.database_url, settings).await
}

/// Initialize application state against an explicit database URL
pub async fn initialize_app_state_with_url(database_url: &str, settings: &Settings) -> Result<AppState> {
    info!("Connecting to database: {}", database_url);
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    let db = Database::connect(options).await?;
    debug!("Database connection established");

    let cache = Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
        .build();

    let auth = AuthKeys::new(
        &settings.jwt_secret,
        settings.access_token_minutes,
        settings.refresh_token_days,
    );
    let throttles = Throttles::from_settings(&settings.throttle)?;
    debug!("Throttles configured, enabled: {}", settings.throttle.enabled);

    Ok(AppState {
        db,
        cache,
        auth: Arc::new(auth),
        throttles: Arc::new(throttles),
        request_timeout: Duration::from_secs(settings.request_timeout_secs),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bind_address, "127.0.0.1:8000");
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.throttle.daily, "10000/d");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("lms-settings-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "workers = 8\nbind_address = \"0.0.0.0:9000\"\n\n[throttle]\nenabled = false\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.workers, 8);
        assert_eq!(settings.bind_address, "0.0.0.0:9000");
        assert!(!settings.throttle.enabled);
        // Untouched keys keep their defaults
        assert_eq!(settings.throttle.anon, "10/m");
        assert_eq!(settings.request_timeout_secs, 30);
    }
}
