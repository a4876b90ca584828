use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub retry: RetryConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Collection endpoint, e.g. `/api/pins`. `PATCH` goes to `{records_path}/{id}`.
    pub records_path: String,
    pub timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Endpoint used by the connectivity probe.
    pub health_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_retries: u32,
    /// Periodic fallback drain for the retry queue.
    pub tick_secs: u64,
    /// Spawn a follow-up drain after `add` and after a retryable failure.
    pub schedule_drains: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub collection: String,
    pub interval_secs: u64,
    pub probe_interval_secs: u64,
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://claimsync.db".to_string(),
                max_connections: 5,
            },
            remote: RemoteConfig {
                base_url: "http://localhost:3000".to_string(),
                records_path: "/api/pins".to_string(),
                timeout_secs: 30,
                auth_token: None,
                health_path: "/api/health".to_string(),
            },
            retry: RetryConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_retries: 3,
            tick_secs: 60,
            schedule_drains: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: "pins".to_string(),
            interval_secs: 30,
            probe_interval_secs: 15,
            event_capacity: 256,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// `initial_delay * 2^retry_count`, saturating.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("CLAIMSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_parsed::<u32>("CLAIMSYNC_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.max(1);
        }

        if let Ok(v) = std::env::var("CLAIMSYNC_API_BASE_URL") {
            if !v.trim().is_empty() {
                cfg.remote.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("CLAIMSYNC_RECORDS_PATH") {
            if !v.trim().is_empty() {
                cfg.remote.records_path = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("CLAIMSYNC_API_TOKEN") {
            cfg.remote.auth_token = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Some(value) = env_parsed::<u64>("CLAIMSYNC_API_TIMEOUT_SECS") {
            cfg.remote.timeout_secs = value.max(1);
        }

        if let Some(value) = env_parsed::<u64>("CLAIMSYNC_RETRY_INITIAL_DELAY_MS") {
            cfg.retry.initial_delay_ms = value;
        }
        if let Some(value) = env_parsed::<u32>("CLAIMSYNC_RETRY_MAX_RETRIES") {
            cfg.retry.max_retries = value;
        }
        if let Some(value) = env_parsed::<u64>("CLAIMSYNC_RETRY_TICK_SECS") {
            cfg.retry.tick_secs = value.max(1);
        }
        if let Ok(v) = std::env::var("CLAIMSYNC_RETRY_SCHEDULE_DRAINS") {
            cfg.retry.schedule_drains = parse_bool(&v, cfg.retry.schedule_drains);
        }

        if let Ok(v) = std::env::var("CLAIMSYNC_COLLECTION") {
            if !v.trim().is_empty() {
                cfg.sync.collection = v.trim().to_string();
            }
        }
        if let Some(value) = env_parsed::<u64>("CLAIMSYNC_SYNC_INTERVAL_SECS") {
            cfg.sync.interval_secs = value.max(1);
        }
        if let Some(value) = env_parsed::<u64>("CLAIMSYNC_PROBE_INTERVAL_SECS") {
            cfg.sync.probe_interval_secs = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err("Remote base_url must be an http(s) URL".to_string());
        }
        if !self.remote.records_path.starts_with('/') {
            return Err("Remote records_path must start with '/'".to_string());
        }
        if self.retry.max_retries == 0 {
            return Err("Retry max_retries must be greater than 0".to_string());
        }
        if self.retry.initial_delay_ms == 0 {
            return Err("Retry initial_delay_ms must be greater than 0".to_string());
        }
        if self.sync.interval_secs == 0 {
            return Err("Sync interval_secs must be greater than 0".to_string());
        }
        if self.sync.collection.trim().is_empty() {
            return Err("Sync collection cannot be empty".to_string());
        }
        if self.sync.event_capacity == 0 {
            return Err("Sync event_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_for(0), Duration::from_millis(1000));
        assert_eq!(retry.backoff_for(1), Duration::from_millis(2000));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(4000));
        assert_eq!(retry.backoff_for(200), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn validate_rejects_relative_records_path() {
        let mut cfg = AppConfig::default();
        cfg.remote.records_path = "api/pins".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retries() {
        let mut cfg = AppConfig::default();
        cfg.retry.max_retries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("YES", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("maybe", true));
    }
}
