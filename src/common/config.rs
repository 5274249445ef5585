//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::retry::RetryPolicy;

pub const MIN_CHUNK_SIZE_BYTES: u64 = 1024;
pub const MAX_CHUNK_SIZE_BYTES: u64 = 256 * 1024;

const ENV_PREFIX: &str = "CODEDROP_";

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "codedrop")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("codedrop.toml"))
}

/// Listen address for the rendezvous service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Room lifetime. Rooms older than `ttl_secs` are evicted on the next sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 10 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl RoomSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Offer/answer handshake timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EstablishSettings {
    pub poll_interval_ms: u64,
    /// Offerer: attempts at `get-answer` (120 x 1s = 2 minutes)
    pub answer_poll_attempts: u32,
    /// Answerer: attempts at `check-room` while waiting for an offer
    pub offer_poll_attempts: u32,
    /// Watchdog after the remote descriptor is applied
    pub ready_timeout_ms: u64,
    /// Pause between tearing down a stale negotiator and starting a new one
    pub settle_ms: u64,
}

impl Default for EstablishSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            answer_poll_attempts: 120,
            offer_poll_attempts: 30,
            ready_timeout_ms: 10_000,
            settle_ms: 100,
        }
    }
}

impl EstablishSettings {
    pub fn answer_poll(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.answer_poll_attempts,
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn offer_poll(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.offer_poll_attempts,
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Chunking and flow-control tuning. None of these are protocol invariants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Payload bytes per chunk
    pub chunk_size: u64,
    /// Buffered bytes above which a chunk send is deferred
    pub high_water_mark: u64,
    /// Buffered bytes above which the sender pauses between batches
    pub batch_threshold: u64,
    /// Chunks per batch
    pub batch_size: u32,
    pub send_retries: u32,
    pub send_retry_interval_ms: u64,
    pub metadata_settle_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub max_batch_pause_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size: 32 * 1024,
            high_water_mark: 16 * 1024 * 1024,
            batch_threshold: 8 * 1024 * 1024,
            batch_size: 20,
            send_retries: 50,
            send_retry_interval_ms: 100,
            metadata_settle_ms: 100,
            heartbeat_interval_secs: 10,
            max_batch_pause_ms: 200,
        }
    }
}

impl TransferSettings {
    pub fn send_retry(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.send_retries,
            Duration::from_millis(self.send_retry_interval_ms),
        )
    }

    pub fn metadata_settle(&self) -> Duration {
        Duration::from_millis(self.metadata_settle_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Linear drain pause for the given buffered amount, capped.
    pub fn batch_pause(&self, buffered: u64) -> Duration {
        Duration::from_millis((buffered / 10_000).min(self.max_batch_pause_ms))
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub rooms: RoomSettings,
    pub establish: EstablishSettings,
    pub transfer: TransferSettings,
}

impl AppConfig {
    /// Validates bounds and rejects unsafe values.
    pub fn validate(&self) -> Result<()> {
        let rooms = &self.rooms;
        ensure!(rooms.ttl_secs > 0, "Invalid config: rooms.ttl_secs must be > 0");
        ensure!(
            rooms.sweep_interval_secs > 0,
            "Invalid config: rooms.sweep_interval_secs must be > 0"
        );
        ensure!(
            rooms.sweep_interval_secs <= rooms.ttl_secs,
            "Invalid config: rooms.sweep_interval_secs must be <= rooms.ttl_secs"
        );

        let establish = &self.establish;
        ensure!(
            establish.poll_interval_ms > 0,
            "Invalid config: establish.poll_interval_ms must be > 0"
        );
        ensure!(
            establish.answer_poll_attempts > 0 && establish.offer_poll_attempts > 0,
            "Invalid config: establish poll attempts must be > 0"
        );
        ensure!(
            establish.ready_timeout_ms > 0,
            "Invalid config: establish.ready_timeout_ms must be > 0"
        );

        Self::validate_transfer(&self.transfer)
    }

    fn validate_transfer(transfer: &TransferSettings) -> Result<()> {
        ensure!(
            transfer.chunk_size >= MIN_CHUNK_SIZE_BYTES,
            "Invalid config: transfer.chunk_size must be >= {MIN_CHUNK_SIZE_BYTES}"
        );
        ensure!(
            transfer.chunk_size <= MAX_CHUNK_SIZE_BYTES,
            "Invalid config: transfer.chunk_size must be <= {MAX_CHUNK_SIZE_BYTES}"
        );
        ensure!(
            transfer.high_water_mark >= transfer.chunk_size,
            "Invalid config: transfer.high_water_mark must be >= transfer.chunk_size"
        );
        ensure!(
            transfer.batch_threshold <= transfer.high_water_mark,
            "Invalid config: transfer.batch_threshold must be <= transfer.high_water_mark"
        );
        ensure!(
            transfer.batch_size >= 1,
            "Invalid config: transfer.batch_size must be >= 1"
        );
        ensure!(
            transfer.send_retries >= 1,
            "Invalid config: transfer.send_retries must be >= 1"
        );
        ensure!(
            transfer.heartbeat_interval_secs > 0,
            "Invalid config: transfer.heartbeat_interval_secs must be > 0"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

/// Loads config using an explicit file path for the file layer.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(host) = &overrides.host {
        config.server.host = host.clone();
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().expect("defaults should validate");
    }

    #[test]
    fn rejects_batch_threshold_above_high_water_mark() {
        let mut config = AppConfig::default();
        config.transfer.batch_threshold = config.transfer.high_water_mark + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_sweep_slower_than_ttl() {
        let mut config = AppConfig::default();
        config.rooms.sweep_interval_secs = config.rooms.ttl_secs + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_pause_is_linear_and_capped() {
        let transfer = TransferSettings::default();
        assert_eq!(transfer.batch_pause(500_000), Duration::from_millis(50));
        assert_eq!(transfer.batch_pause(64 * 1024 * 1024), Duration::from_millis(200));
    }

    #[test]
    fn overrides_replace_host_and_port() {
        let overrides = ConfigOverrides {
            host: Some("127.0.0.1".into()),
            port: Some(8080),
        };
        let config = apply_overrides(AppConfig::default(), &overrides);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }
}
