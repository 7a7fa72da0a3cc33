//! Outbox recorder
//!
//! Every mutation handler calls [`record`] on the same transaction that carries
//! its business write, so a durable mutation always has a durable outbox entry.
//! Recording never talks to the network.

use crate::infra::db::entities::{
	changes_outbox::{self, ChangeOperation},
	ChangesOutboxActive,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// A row of the outbox as seen by the rest of the crate
pub type ChangeEntry = changes_outbox::Model;

#[derive(Debug, Error)]
pub enum RecordError {
	#[error("failed to serialize change snapshot: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("failed to write outbox entry: {0}")]
	Database(#[from] DbErr),
}

/// Insert exactly one change entry describing a mutation.
///
/// `old` is the record before the mutation (absent for inserts), `new` the
/// record after it (absent for deletes).
pub async fn record<C, T>(
	db: &C,
	table: &str,
	operation: ChangeOperation,
	record_id: &str,
	old: Option<&T>,
	new: Option<&T>,
) -> Result<(), RecordError>
where
	C: ConnectionTrait,
	T: Serialize + ?Sized,
{
	let old_values = old.map(serde_json::to_value).transpose()?;
	let new_values = new.map(serde_json::to_value).transpose()?;

	let entry = ChangesOutboxActive {
		id: Set(Uuid::now_v7().to_string()),
		table_name: Set(table.to_string()),
		operation: Set(operation),
		record_id: Set(record_id.to_string()),
		old_values: Set(old_values),
		new_values: Set(new_values),
		created_at: Set(Utc::now()),
		synced_at: Set(None),
		sync_attempts: Set(0),
		error: Set(None),
	};

	let entry = entry.insert(db).await?;

	debug!(
		change_id = %entry.id,
		table = %table,
		operation = %operation,
		record_id = %record_id,
		"Recorded change in outbox"
	);

	Ok(())
}

/// [`record`], but a failure is logged instead of returned so the caller's
/// mutation still goes through. Returns whether the entry was written.
pub async fn record_or_log<C, T>(
	db: &C,
	table: &str,
	operation: ChangeOperation,
	record_id: &str,
	old: Option<&T>,
	new: Option<&T>,
) -> bool
where
	C: ConnectionTrait,
	T: Serialize + ?Sized,
{
	match record(db, table, operation, record_id, old, new).await {
		Ok(()) => true,
		Err(e) => {
			warn!(
				table = %table,
				operation = %operation,
				record_id = %record_id,
				error = %e,
				"Failed to record change in outbox, continuing without it"
			);
			false
		}
	}
}

impl changes_outbox::Model {
	pub fn is_synced(&self) -> bool {
		self.synced_at.is_some()
	}

	/// Top-level fields that differ between the before and after snapshots.
	///
	/// Inserts report every field of `new_values`, deletes every field of
	/// `old_values`. Non-object snapshots contribute no field names.
	pub fn changed_fields(&self) -> Vec<String> {
		let empty = serde_json::Map::new();
		let as_object = |value: &Option<Value>| match value {
			Some(Value::Object(map)) => Some(map.clone()),
			_ => None,
		};

		let old = as_object(&self.old_values);
		let new = as_object(&self.new_values);
		let old = old.as_ref().unwrap_or(&empty);
		let new = new.as_ref().unwrap_or(&empty);

		old.keys()
			.chain(new.keys())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.filter(|key| old.get(*key) != new.get(*key))
			.cloned()
			.collect()
	}
}
