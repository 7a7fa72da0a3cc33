//! Background services management

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub mod license;
pub mod sync;

use license::LicenseService;
use sync::SyncService;

/// Container for all background services
pub struct Services {
	/// Outbox synchronization and its auto-sync timer
	pub sync: Arc<SyncService>,

	/// License verification scheduler
	pub license: Arc<LicenseService>,
}

impl Services {
	pub fn new(sync: Arc<SyncService>, license: Arc<LicenseService>) -> Self {
		Self { sync, license }
	}

	/// Start all services.
	///
	/// The license scheduler goes first so the auto-sync loop sees a loaded
	/// license state on its first tick.
	pub async fn start_all(&self) -> Result<()> {
		info!("Starting all background services");

		self.license.start().await?;
		self.sync.start().await?;

		Ok(())
	}

	/// Stop all services gracefully
	pub async fn stop_all(&self) -> Result<()> {
		info!("Stopping all background services");

		self.sync.stop().await?;
		self.license.stop().await?;

		Ok(())
	}
}

/// Trait for background services
#[async_trait::async_trait]
pub trait Service: Send + Sync {
	/// Start the service
	async fn start(&self) -> Result<()>;

	/// Stop the service gracefully
	async fn stop(&self) -> Result<()>;

	/// Check if the service is running
	fn is_running(&self) -> bool;

	/// Get service name
	fn name(&self) -> &'static str;
}
