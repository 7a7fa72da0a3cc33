//! Tether core
//!
//! Local-first durability for the desktop host: an embedded database, an
//! outbox of every local mutation, a sync engine replaying that outbox to the
//! remote service, and a cached license that gates local writes.

pub mod commands;
pub mod config;
pub mod infra;
pub mod ops;
pub mod service;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::infra::{
	db::Database,
	event::{Event, EventBus},
};
use crate::ops::{inventory::InventoryOps, jobs::JobOps};
use crate::service::{
	license::{DeviceIdentity, HttpLicenseClient, LicenseClient, LicenseService},
	sync::{HttpSyncTransport, NetworkProbe, SyncEngine, SyncService, SyncTransport, TcpProbe},
	Services,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub use commands::CommandError;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The remote-facing pieces of the core, swappable for tests and embedders
pub struct Collaborators {
	pub transport: Arc<dyn SyncTransport>,
	pub probe: Arc<dyn NetworkProbe>,
	pub license_client: Arc<dyn LicenseClient>,
}

impl Collaborators {
	/// HTTPS transport, TCP probe and HTTPS license client from configuration
	pub fn from_config(config: &AppConfig) -> Result<Self> {
		let license_client = HttpLicenseClient::new(
			config.license.endpoint_url()?,
			config.sync.api_token.clone(),
			config.license.request_timeout(),
		)?;

		Ok(Self {
			transport: Arc::new(HttpSyncTransport::from_config(&config.sync)?),
			probe: Arc::new(TcpProbe::from_config(&config.sync)?),
			license_client: Arc::new(license_client),
		})
	}
}

/// The main context for all core operations
pub struct Core {
	/// Application configuration
	config: AppConfig,

	/// Embedded database
	db: Database,

	/// Event bus for state changes
	pub events: Arc<EventBus>,

	sync: Arc<SyncService>,

	license: Arc<LicenseService>,

	/// Background services
	services: Services,

	inventory: InventoryOps,

	jobs: JobOps,
}

impl Core {
	/// Initialize a new Core instance with default data directory
	pub async fn new() -> Result<Self> {
		let data_dir = crate::config::default_data_dir()?;
		Self::new_with_config(data_dir).await
	}

	/// Initialize a new Core instance with custom data directory
	pub async fn new_with_config(data_dir: PathBuf) -> Result<Self> {
		let config = AppConfig::load_or_create(&data_dir)?;
		let collaborators = Collaborators::from_config(&config)?;
		Self::with_collaborators(config, collaborators).await
	}

	/// Initialize a Core instance talking to the given collaborators.
	///
	/// Background services are not started; see [`Core::start_services`].
	pub async fn with_collaborators(config: AppConfig, collaborators: Collaborators) -> Result<Self> {
		info!("Initializing Tether core at {:?}", config.data_dir);

		// 1. Directories and database; a failed migration aborts startup
		config.ensure_directories()?;
		let db = Database::create(&config.database_path())
			.await
			.context("Failed to open database")?;
		db.migrate().await.context("Database migration failed")?;

		// 2. Event bus
		let events = Arc::new(EventBus::default());

		// 3. License cache, loaded before anything consults it
		let identity = DeviceIdentity {
			user_id: config.license.user_id.clone(),
			device_id: config.device_id.to_string(),
			device_name: config.device_name.clone(),
			app_version: APP_VERSION.to_string(),
		};
		let license = Arc::new(LicenseService::new(
			db.conn().clone(),
			collaborators.license_client,
			events.clone(),
			config.license.clone(),
			identity,
		));
		license
			.load()
			.await
			.context("Failed to load cached license state")?;

		// 4. Sync engine and its scheduler, gated by the license
		let engine = Arc::new(SyncEngine::new(
			db.conn().clone(),
			collaborators.transport,
			collaborators.probe,
			events.clone(),
			config.sync.clone(),
		));
		let sync = Arc::new(SyncService::new(engine).with_gate(license.clone()));

		// 5. Mutation handlers
		let inventory = InventoryOps::new(db.conn().clone(), license.clone(), events.clone());
		let jobs = JobOps::new(db.conn().clone(), license.clone(), events.clone());

		let services = Services::new(sync.clone(), license.clone());

		events.emit(Event::CoreStarted);

		Ok(Self {
			config,
			db,
			events,
			sync,
			license,
			services,
			inventory,
			jobs,
		})
	}

	pub fn config(&self) -> &AppConfig {
		&self.config
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	pub fn sync_engine(&self) -> &Arc<SyncEngine> {
		self.sync.engine()
	}

	pub fn license(&self) -> &Arc<LicenseService> {
		&self.license
	}

	/// Start the auto-sync loop and the license scheduler
	pub async fn start_services(&self) -> Result<()> {
		info!("Starting background services...");
		self.services.start_all().await?;
		info!("Background services started");
		Ok(())
	}

	/// Shutdown the core gracefully
	pub async fn shutdown(&self) -> Result<()> {
		info!("Shutting down Tether core...");

		if let Err(e) = self.services.stop_all().await {
			error!("Failed to stop services: {}", e);
		}

		self.events.emit(Event::CoreShutdown);

		info!("Tether core shutdown complete");
		Ok(())
	}
}
