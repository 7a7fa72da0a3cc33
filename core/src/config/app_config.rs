//! Application configuration

use super::default_data_dir;
use crate::config::migration::Migrate;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const CONFIG_FILE: &str = "tether.json";
const DATABASE_FILE: &str = "tether.db";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Logging level
	pub log_level: String,

	/// Stable identifier of this installation, sent to the license authority
	pub device_id: Uuid,

	/// Human readable device name
	pub device_name: String,

	/// Outbox synchronization
	#[serde(default)]
	pub sync: SyncConfig,

	/// License verification
	#[serde(default)]
	pub license: LicenseConfig,
}

/// Configuration for the synchronization engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	/// Remote endpoint receiving change batches
	pub endpoint: Option<String>,

	/// Bearer credential for the endpoint
	pub api_token: Option<String>,

	/// Maximum entries per request
	pub batch_size: u64,

	/// Whether the background timer drains the outbox
	pub auto_sync_enabled: bool,

	pub auto_sync_interval_secs: u64,

	/// Upper bound on a single batch request
	pub request_timeout_secs: u64,

	/// Upper bound on the reachability probe
	pub probe_timeout_secs: u64,

	/// Backoff unit for retries, doubled per prior attempt
	pub retry_base_delay_ms: u64,

	/// Cap on any single backoff delay
	pub max_backoff_secs: u64,

	/// Entries with more attempts than this count as failed in status
	pub failure_threshold: u32,

	/// Entries at or above this many attempts are left out of retry selection
	pub max_attempts: u32,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			endpoint: None,
			api_token: None,
			batch_size: 100,
			auto_sync_enabled: true,
			auto_sync_interval_secs: 300,
			request_timeout_secs: 30,
			probe_timeout_secs: 5,
			retry_base_delay_ms: 1_000,
			max_backoff_secs: 300,
			failure_threshold: 3,
			max_attempts: 10,
		}
	}
}

impl SyncConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn probe_timeout(&self) -> Duration {
		Duration::from_secs(self.probe_timeout_secs)
	}

	pub fn auto_sync_interval(&self) -> Duration {
		Duration::from_secs(self.auto_sync_interval_secs.max(1))
	}

	pub fn retry_base_delay(&self) -> Duration {
		Duration::from_millis(self.retry_base_delay_ms)
	}

	pub fn max_backoff(&self) -> Duration {
		Duration::from_secs(self.max_backoff_secs)
	}

	pub fn endpoint_url(&self) -> Result<Option<reqwest::Url>> {
		parse_endpoint(self.endpoint.as_deref())
	}
}

/// Configuration for license verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
	/// Remote entitlement endpoint
	pub endpoint: Option<String>,

	/// Account the license is verified for
	pub user_id: Option<String>,

	pub request_timeout_secs: u64,

	/// How often the scheduler looks at `next_verify_at`
	pub check_interval_secs: u64,

	/// Wait after a failed verification before trying again
	pub failure_retry_secs: u64,
}

impl Default for LicenseConfig {
	fn default() -> Self {
		Self {
			endpoint: None,
			user_id: None,
			request_timeout_secs: 15,
			check_interval_secs: 60,
			failure_retry_secs: 300,
		}
	}
}

impl LicenseConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}

	pub fn check_interval(&self) -> Duration {
		Duration::from_secs(self.check_interval_secs.max(1))
	}

	pub fn failure_retry(&self) -> Duration {
		Duration::from_secs(self.failure_retry_secs)
	}

	pub fn endpoint_url(&self) -> Result<Option<reqwest::Url>> {
		parse_endpoint(self.endpoint.as_deref())
	}
}

fn parse_endpoint(raw: Option<&str>) -> Result<Option<reqwest::Url>> {
	match raw.map(str::trim) {
		None | Some("") => Ok(None),
		Some(raw) => reqwest::Url::parse(raw)
			.map(Some)
			.with_context(|| format!("Invalid endpoint URL: {raw}")),
	}
}

impl AppConfig {
	/// Load configuration from the default location
	pub fn load() -> Result<Self> {
		let data_dir = default_data_dir()?;
		Self::load_from(&data_dir)
	}

	/// Load configuration from a specific data directory
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let mut config: AppConfig = serde_json::from_str(&json)
				.with_context(|| format!("Failed to parse {}", config_path.display()))?;

			// Apply migrations if needed
			if config.version < Self::target_version() {
				info!(
					"Migrating config from v{} to v{}",
					config.version,
					Self::target_version()
				);
				config.migrate()?;
				config.save()?;
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		}
	}

	/// Load or create configuration
	pub fn load_or_create(data_dir: &Path) -> Result<Self> {
		Self::load_from(data_dir).or_else(|e| {
			warn!("Failed to load config, replacing with defaults: {e:#}");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		})
	}

	/// Create default configuration with specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			device_id: Uuid::new_v4(),
			device_name: whoami::devicename(),
			sync: SyncConfig::default(),
			license: LicenseConfig::default(),
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		// Ensure directory exists
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Get the path of the embedded database
	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join(DATABASE_FILE)
	}

	/// Get the path for logs directory
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	/// Ensure all required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		fs::create_dir_all(self.logs_dir())?;
		Ok(())
	}
}

impl Default for AppConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}

impl Migrate for AppConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		2 // License section added
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			// v1 predates the license section; serde filled in its defaults on load
			1 => {
				self.version = 2;
				Ok(())
			}
			2 => Ok(()), // Already at target version
			v => Err(anyhow!("Unknown config version: {}", v)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn creates_default_config_when_missing() {
		let dir = TempDir::new().unwrap();
		let config = AppConfig::load_from(dir.path()).unwrap();

		assert_eq!(config.version, AppConfig::target_version());
		assert_eq!(config.sync, SyncConfig::default());
		assert!(dir.path().join(CONFIG_FILE).exists());

		let reloaded = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(reloaded.device_id, config.device_id);
	}

	#[test]
	fn migrates_v1_config_and_fills_license_defaults() {
		let dir = TempDir::new().unwrap();
		let v1 = serde_json::json!({
			"version": 1,
			"data_dir": dir.path(),
			"log_level": "debug",
			"device_id": Uuid::new_v4(),
			"device_name": "bench",
			"sync": { "endpoint": "https://sync.example.com/changes", "batch_size": 25 }
		});
		fs::write(dir.path().join(CONFIG_FILE), v1.to_string()).unwrap();

		let config = AppConfig::load_from(dir.path()).unwrap();
		assert_eq!(config.version, 2);
		assert_eq!(config.log_level, "debug");
		assert_eq!(config.sync.batch_size, 25);
		assert_eq!(config.sync.request_timeout_secs, 30);
		assert_eq!(config.license, LicenseConfig::default());
	}

	#[test]
	fn endpoint_parsing() {
		let mut sync = SyncConfig::default();
		assert!(sync.endpoint_url().unwrap().is_none());

		sync.endpoint = Some("  ".into());
		assert!(sync.endpoint_url().unwrap().is_none());

		sync.endpoint = Some("https://sync.example.com/v1/changes".into());
		assert_eq!(
			sync.endpoint_url().unwrap().unwrap().host_str(),
			Some("sync.example.com")
		);

		sync.endpoint = Some("not a url".into());
		assert!(sync.endpoint_url().is_err());
	}
}
