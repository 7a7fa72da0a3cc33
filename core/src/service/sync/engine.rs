//! Outbox synchronization engine
//!
//! Drains unsynced outbox entries in creation order, one bounded batch per
//! run. `synced_at` is only ever set for entries the remote explicitly
//! accepted; everything else keeps its place in the queue with one more
//! attempt counted against it.

use super::transport::{NetworkProbe, SyncTransport};
use crate::{
	config::SyncConfig,
	infra::{
		db::entities::{
			changes_outbox,
			sync_log::{self, SyncRunStatus},
			ChangesOutbox, SyncLog, SyncLogActive,
		},
		event::{Event, EventBus},
		outbox::ChangeEntry,
	},
};
use chrono::{DateTime, Utc};
use sea_orm::{
	sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
	EntityTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
	TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Message stored on every entry of a batch that was never sent
pub const NETWORK_UNAVAILABLE: &str = "Network unavailable";

#[derive(Debug, Error)]
pub enum SyncError {
	#[error("database error: {0}")]
	Database(#[from] DbErr),

	#[error("a sync run is already in progress")]
	InProgress,

	#[error("no sync endpoint is configured")]
	NotConfigured,
}

/// Outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
	pub synced: u64,
	pub failed: u64,
	pub errors: Vec<ChangeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFailure {
	pub change_id: String,
	pub error: String,
}

impl SyncResult {
	fn all_failed(ids: &[String], error: &str) -> Self {
		Self {
			synced: 0,
			failed: ids.len() as u64,
			errors: ids
				.iter()
				.map(|id| ChangeFailure {
					change_id: id.clone(),
					error: error.to_string(),
				})
				.collect(),
		}
	}

	fn run_status(&self) -> SyncRunStatus {
		match (self.synced, self.failed) {
			(_, 0) => SyncRunStatus::Success,
			(0, _) => SyncRunStatus::Failed,
			_ => SyncRunStatus::Partial,
		}
	}
}

/// Local view of the outbox, no network involved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
	/// Entries not yet accepted by the remote
	pub pending: u64,
	pub synced: u64,
	/// Unsynced entries whose attempts exceed the failure threshold
	pub failed: u64,
	/// Newest run that got at least one entry accepted
	pub last_sync_at: Option<DateTime<Utc>>,
	pub in_progress: bool,
}

pub type SyncRun = sync_log::Model;

/// Batch-level backoff: `base * 2^attempts`, never more than `cap`
pub fn backoff_delay(base: Duration, attempts: i32, cap: Duration) -> Duration {
	let exponent = attempts.clamp(0, 31) as u32;
	base.checked_mul(1u32 << exponent)
		.unwrap_or(cap)
		.min(cap)
}

/// Clears the in-flight flag when a run ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub struct SyncEngine {
	db: DatabaseConnection,
	transport: Arc<dyn SyncTransport>,
	probe: Arc<dyn NetworkProbe>,
	events: Arc<EventBus>,
	config: SyncConfig,
	in_flight: AtomicBool,
}

impl SyncEngine {
	pub fn new(
		db: DatabaseConnection,
		transport: Arc<dyn SyncTransport>,
		probe: Arc<dyn NetworkProbe>,
		events: Arc<EventBus>,
		config: SyncConfig,
	) -> Self {
		Self {
			db,
			transport,
			probe,
			events,
			config,
			in_flight: AtomicBool::new(false),
		}
	}

	pub fn config(&self) -> &SyncConfig {
		&self.config
	}

	pub fn events(&self) -> &Arc<EventBus> {
		&self.events
	}

	pub fn is_configured(&self) -> bool {
		self.transport.is_configured()
	}

	pub fn in_progress(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	/// Unsynced entries, oldest first
	pub async fn get_pending_changes(&self, limit: u64) -> Result<Vec<ChangeEntry>, SyncError> {
		Ok(ChangesOutbox::find()
			.filter(changes_outbox::Column::SyncedAt.is_null())
			.order_by_asc(changes_outbox::Column::CreatedAt)
			.order_by_asc(changes_outbox::Column::Id)
			.limit(limit)
			.all(&self.db)
			.await?)
	}

	pub async fn get_change(&self, id: &str) -> Result<Option<ChangeEntry>, SyncError> {
		Ok(ChangesOutbox::find_by_id(id.to_string())
			.one(&self.db)
			.await?)
	}

	/// Push the oldest batch of unsynced entries.
	///
	/// Returns [`SyncError::InProgress`] without touching anything when another
	/// run holds the in-flight flag.
	pub async fn sync_pending(&self) -> Result<SyncResult, SyncError> {
		if !self.transport.is_configured() {
			return Err(SyncError::NotConfigured);
		}

		let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(SyncError::InProgress)?;

		let batch = self.get_pending_changes(self.config.batch_size).await?;
		if batch.is_empty() {
			debug!("Outbox is empty, nothing to sync");
			return Ok(SyncResult::default());
		}

		let ids: Vec<String> = batch.iter().map(|entry| entry.id.clone()).collect();

		if !self.probe.is_reachable().await {
			warn!(batch_size = ids.len(), "Sync endpoint unreachable, deferring batch");

			mark_attempt_failed(&self.db, &ids, NETWORK_UNAVAILABLE).await?;
			let result = SyncResult::all_failed(&ids, NETWORK_UNAVAILABLE);
			self.finish_run(SyncRunStatus::Offline, &result).await;
			return Ok(result);
		}

		let response = match self.transport.push(&batch).await {
			Ok(response) => response,
			Err(e) => {
				warn!(
					category = %e.category(),
					error = %e,
					batch_size = ids.len(),
					"Sync request failed"
				);

				let message = e.to_string();
				mark_attempt_failed(&self.db, &ids, &message).await?;
				let result = SyncResult::all_failed(&ids, &message);
				self.finish_run(SyncRunStatus::Failed, &result).await;
				return Ok(result);
			}
		};

		let in_batch: HashSet<&str> = ids.iter().map(String::as_str).collect();
		let mut rejected: HashMap<&str, &str> = HashMap::new();
		for rejection in response.rejected() {
			if in_batch.contains(rejection.change_id.as_str()) {
				rejected.insert(rejection.change_id.as_str(), rejection.error.as_str());
			} else {
				debug!(change_id = %rejection.change_id, "Ignoring rejection for an entry not in this batch");
			}
		}

		// Failures the remote counted but did not name cannot be told apart
		// from accepted entries, so nothing in the batch counts as accepted
		if response.failed > rejected.len() as u64 {
			warn!(
				reported_failed = response.failed,
				listed = rejected.len(),
				batch_size = ids.len(),
				"Remote reported unidentified failures, keeping the whole batch"
			);

			let message = format!(
				"Remote reported {} failed change(s) but identified {}",
				response.failed,
				rejected.len()
			);
			mark_attempt_failed(&self.db, &ids, &message).await?;
			let result = SyncResult::all_failed(&ids, &message);
			self.finish_run(SyncRunStatus::Failed, &result).await;
			return Ok(result);
		}

		// Only ids absent from the error list count as accepted
		let accepted: Vec<String> = ids
			.iter()
			.filter(|id| !rejected.contains_key(id.as_str()))
			.cloned()
			.collect();

		let txn = self.db.begin().await?;
		mark_synced(&txn, &accepted, Utc::now()).await?;
		for (id, error) in &rejected {
			mark_attempt_failed(&txn, &[id.to_string()], error).await?;
		}
		txn.commit().await?;

		let mut errors: Vec<ChangeFailure> = rejected
			.into_iter()
			.map(|(id, error)| ChangeFailure {
				change_id: id.to_string(),
				error: error.to_string(),
			})
			.collect();
		errors.sort_by(|a, b| a.change_id.cmp(&b.change_id));

		let result = SyncResult {
			synced: accepted.len() as u64,
			failed: errors.len() as u64,
			errors,
		};

		if response.synced != result.synced {
			debug!(
				reported = response.synced,
				accepted = result.synced,
				"Remote synced count differs from per-entry outcome"
			);
		}

		info!(synced = result.synced, failed = result.failed, "Sync run completed");
		self.finish_run(result.run_status(), &result).await;

		Ok(result)
	}

	/// Wait out the batch-level backoff, then run [`Self::sync_pending`].
	pub async fn retry_failed(&self, max_attempts: u32) -> Result<SyncResult, SyncError> {
		if !self.transport.is_configured() {
			return Err(SyncError::NotConfigured);
		}

		let Some(delay) = self.retry_delay(max_attempts).await? else {
			return Ok(SyncResult::default());
		};

		tokio::time::sleep(delay).await;

		self.sync_pending().await
	}

	/// Backoff owed before the next retry, or `None` when nothing is eligible.
	///
	/// Candidates are unsynced entries with fewer than `max_attempts` attempts,
	/// fewest attempts first then oldest, up to one batch. The delay grows with
	/// the highest attempt count among them.
	pub async fn retry_delay(&self, max_attempts: u32) -> Result<Option<Duration>, SyncError> {
		let candidates = ChangesOutbox::find()
			.filter(changes_outbox::Column::SyncedAt.is_null())
			.filter(changes_outbox::Column::SyncAttempts.lt(max_attempts as i32))
			.order_by_asc(changes_outbox::Column::SyncAttempts)
			.order_by_asc(changes_outbox::Column::CreatedAt)
			.order_by_asc(changes_outbox::Column::Id)
			.limit(self.config.batch_size)
			.all(&self.db)
			.await?;

		let Some(highest) = candidates.iter().map(|entry| entry.sync_attempts).max() else {
			debug!(max_attempts, "No entries eligible for retry");
			return Ok(None);
		};

		let delay = backoff_delay(
			self.config.retry_base_delay(),
			highest,
			self.config.max_backoff(),
		);

		info!(
			candidates = candidates.len(),
			highest_attempts = highest,
			delay_ms = delay.as_millis() as u64,
			"Backing off before retrying failed changes"
		);

		Ok(Some(delay))
	}

	/// Reset one unsynced entry's attempts and error so it is retried promptly.
	/// Returns false when no such unsynced entry exists.
	pub async fn clear_error(&self, change_id: &str) -> Result<bool, SyncError> {
		let result = ChangesOutbox::update_many()
			.col_expr(changes_outbox::Column::SyncAttempts, Expr::value(0))
			.col_expr(
				changes_outbox::Column::Error,
				Expr::value(Option::<String>::None),
			)
			.filter(changes_outbox::Column::Id.eq(change_id))
			.filter(changes_outbox::Column::SyncedAt.is_null())
			.exec(&self.db)
			.await?;

		let cleared = result.rows_affected > 0;
		if cleared {
			info!(change_id = %change_id, "Cleared sync error");
		}

		Ok(cleared)
	}

	pub async fn get_sync_status(&self) -> Result<SyncStatus, SyncError> {
		let pending = ChangesOutbox::find()
			.filter(changes_outbox::Column::SyncedAt.is_null())
			.count(&self.db)
			.await?;

		let synced = ChangesOutbox::find()
			.filter(changes_outbox::Column::SyncedAt.is_not_null())
			.count(&self.db)
			.await?;

		let failed = ChangesOutbox::find()
			.filter(changes_outbox::Column::SyncedAt.is_null())
			.filter(changes_outbox::Column::SyncAttempts.gt(self.config.failure_threshold as i32))
			.count(&self.db)
			.await?;

		let last_sync_at = SyncLog::find()
			.filter(sync_log::Column::Status.is_in([SyncRunStatus::Success, SyncRunStatus::Partial]))
			.order_by_desc(sync_log::Column::SyncAt)
			.one(&self.db)
			.await?
			.map(|run| run.sync_at);

		Ok(SyncStatus {
			pending,
			synced,
			failed,
			last_sync_at,
			in_progress: self.in_progress(),
		})
	}

	/// Recent sync runs, newest first
	pub async fn history(&self, limit: u64) -> Result<Vec<SyncRun>, SyncError> {
		Ok(SyncLog::find()
			.order_by_desc(sync_log::Column::SyncAt)
			.order_by_desc(sync_log::Column::Id)
			.limit(limit)
			.all(&self.db)
			.await?)
	}

	async fn finish_run(&self, status: SyncRunStatus, result: &SyncResult) {
		let run = SyncLogActive {
			id: NotSet,
			status: Set(status),
			entries_pushed: Set(result.synced as i32),
			entries_pulled: Set(0),
			error: Set(result.errors.first().map(|failure| failure.error.clone())),
			sync_at: Set(Utc::now()),
		};

		if let Err(e) = run.insert(&self.db).await {
			warn!(error = %e, "Failed to write sync log entry");
		}

		self.events.emit(Event::SyncCompleted {
			synced: result.synced,
			failed: result.failed,
		});
	}
}

async fn mark_synced<C: ConnectionTrait>(
	db: &C,
	ids: &[String],
	at: DateTime<Utc>,
) -> Result<(), DbErr> {
	if ids.is_empty() {
		return Ok(());
	}

	ChangesOutbox::update_many()
		.col_expr(changes_outbox::Column::SyncedAt, Expr::value(at))
		.col_expr(
			changes_outbox::Column::Error,
			Expr::value(Option::<String>::None),
		)
		.filter(changes_outbox::Column::Id.is_in(ids.iter().cloned()))
		.filter(changes_outbox::Column::SyncedAt.is_null())
		.exec(db)
		.await?;

	Ok(())
}

async fn mark_attempt_failed<C: ConnectionTrait>(
	db: &C,
	ids: &[String],
	error: &str,
) -> Result<(), DbErr> {
	if ids.is_empty() {
		return Ok(());
	}

	ChangesOutbox::update_many()
		.col_expr(
			changes_outbox::Column::SyncAttempts,
			Expr::col(changes_outbox::Column::SyncAttempts).add(1),
		)
		.col_expr(changes_outbox::Column::Error, Expr::value(error))
		.filter(changes_outbox::Column::Id.is_in(ids.iter().cloned()))
		.filter(changes_outbox::Column::SyncedAt.is_null())
		.exec(db)
		.await?;

	Ok(())
}
