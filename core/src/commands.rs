//! Command surface for the host process
//!
//! Every command is a method on [`Core`] returning data the host can render
//! or serialize. Errors serialize as their message.

use crate::{
	infra::{db::AppliedMigration, outbox::ChangeEntry},
	ops::{inventory::InventoryOps, jobs::JobOps, OpsError},
	service::{
		license::{LicenseAction, LicenseError, LicenseState},
		sync::{SyncError, SyncResult, SyncRun, SyncStatus},
	},
	Core,
};
use sea_orm::DbErr;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommandError {
	#[error(transparent)]
	Sync(#[from] SyncError),

	#[error(transparent)]
	License(#[from] LicenseError),

	#[error(transparent)]
	Ops(#[from] OpsError),

	#[error("database error: {0}")]
	Database(#[from] DbErr),

	#[error("change '{0}' not found")]
	ChangeNotFound(String),

	#[error("change '{0}' is already synced")]
	ChangeAlreadySynced(String),
}

impl CommandError {
	/// Whether this is an entitlement decision rather than a failure
	pub fn is_not_allowed(&self) -> bool {
		matches!(
			self,
			Self::License(LicenseError::NotAllowed { .. }) | Self::Ops(OpsError::NotAllowed { .. })
		)
	}
}

impl Serialize for CommandError {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

pub type CommandResult<T> = Result<T, CommandError>;

impl Core {
	/// Unsynced changes, oldest first. `None` means one batch worth.
	pub async fn pending_changes(&self, limit: Option<u64>) -> CommandResult<Vec<ChangeEntry>> {
		let limit = limit.unwrap_or(self.config().sync.batch_size);
		Ok(self.sync_engine().get_pending_changes(limit).await?)
	}

	pub async fn change(&self, id: &str) -> CommandResult<ChangeEntry> {
		self.sync_engine()
			.get_change(id)
			.await?
			.ok_or_else(|| CommandError::ChangeNotFound(id.to_string()))
	}

	pub async fn sync_status(&self) -> CommandResult<SyncStatus> {
		Ok(self.sync_engine().get_sync_status().await?)
	}

	/// Push one batch now, if the license allows sync
	pub async fn sync_now(&self) -> CommandResult<SyncResult> {
		self.license().check(LicenseAction::Sync)?;
		info!("Manual sync requested");
		Ok(self.sync_engine().sync_pending().await?)
	}

	/// Retry with backoff, bounded by the configured attempt limit
	pub async fn retry_failed(&self) -> CommandResult<SyncResult> {
		self.license().check(LicenseAction::Sync)?;
		let max_attempts = self.config().sync.max_attempts;
		Ok(self.sync_engine().retry_failed(max_attempts).await?)
	}

	pub async fn clear_change_error(&self, id: &str) -> CommandResult<()> {
		if self.sync_engine().clear_error(id).await? {
			return Ok(());
		}

		match self.sync_engine().get_change(id).await? {
			Some(_) => Err(CommandError::ChangeAlreadySynced(id.to_string())),
			None => Err(CommandError::ChangeNotFound(id.to_string())),
		}
	}

	pub async fn sync_history(&self, limit: u64) -> CommandResult<Vec<SyncRun>> {
		Ok(self.sync_engine().history(limit).await?)
	}

	pub async fn license_state(&self) -> CommandResult<LicenseState> {
		Ok(self.license().get_state().await?)
	}

	pub async fn verify_license(&self) -> CommandResult<LicenseState> {
		Ok(self.license().verify().await?)
	}

	pub fn can_perform(&self, action: LicenseAction) -> bool {
		self.license().can_perform(action)
	}

	pub async fn applied_migrations(&self) -> CommandResult<Vec<AppliedMigration>> {
		Ok(self.database().applied_migrations().await?)
	}

	pub fn inventory(&self) -> &InventoryOps {
		&self.inventory
	}

	pub fn jobs(&self) -> &JobOps {
		&self.jobs
	}
}
