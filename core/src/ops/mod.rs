//! Mutation handlers for the local business tables
//!
//! Every handler writes its record and the matching outbox entry in one
//! transaction. Outbox trouble is logged and never fails the write.

pub mod inventory;
pub mod jobs;

use crate::{
	infra::{
		db::entities::{changes_outbox::ChangeOperation, license_state::LicenseStatus},
		event::{Event, EventBus},
	},
	service::license::{LicenseAction, LicenseError},
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
	#[error("invalid {field}: {message}")]
	Validation { field: String, message: String },

	#[error("{kind} '{id}' not found")]
	NotFound { kind: &'static str, id: String },

	#[error("{0}")]
	InvalidState(String),

	#[error("{0}")]
	Conflict(String),

	#[error("license status '{status}' does not allow {action}")]
	NotAllowed {
		action: LicenseAction,
		status: LicenseStatus,
	},

	#[error("database error: {0}")]
	Database(DbErr),

	#[error("{0}")]
	Internal(String),
}

impl OpsError {
	pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
		Self::Validation {
			field: field.to_string(),
			message: message.into(),
		}
	}
}

impl From<DbErr> for OpsError {
	fn from(e: DbErr) -> Self {
		match e.sql_err() {
			Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
			_ => Self::Database(e),
		}
	}
}

impl From<LicenseError> for OpsError {
	fn from(e: LicenseError) -> Self {
		match e {
			LicenseError::NotAllowed { action, status } => Self::NotAllowed { action, status },
			other => Self::Internal(other.to_string()),
		}
	}
}

/// Announce a committed change that made it into the outbox
pub(crate) fn announce(
	events: &EventBus,
	recorded: bool,
	table: &str,
	operation: ChangeOperation,
	record_id: &str,
) {
	if recorded {
		events.emit(Event::ChangeRecorded {
			table: table.to_string(),
			operation,
			record_id: record_id.to_string(),
		});
	}
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), OpsError> {
	if value.trim().is_empty() {
		return Err(OpsError::validation(field, "must not be empty"));
	}
	Ok(())
}
