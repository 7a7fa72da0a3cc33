//! Versioned configuration upgrades

use anyhow::Result;

/// Implemented by persisted configuration that carries a schema version
pub trait Migrate {
	/// Version of the loaded value
	fn current_version(&self) -> u32;

	/// Version this build writes
	fn target_version() -> u32;

	/// Upgrade in place to [`Migrate::target_version`]
	fn migrate(&mut self) -> Result<()>;
}
