//! Job handlers

use super::{announce, require_non_empty, OpsError};
use crate::{
	infra::{
		db::entities::{
			changes_outbox::ChangeOperation,
			job::{self, JobStatus},
			Job as JobEntity, JobActive,
		},
		event::EventBus,
		outbox,
	},
	service::license::{LicenseAction, LicenseService},
};
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder, Set,
	TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const TABLE: &str = "jobs";

pub type Job = job::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
	pub title: String,
	pub customer: Option<String>,
}

#[derive(Clone)]
pub struct JobOps {
	db: DatabaseConnection,
	license: Arc<LicenseService>,
	events: Arc<EventBus>,
}

impl JobOps {
	pub fn new(db: DatabaseConnection, license: Arc<LicenseService>, events: Arc<EventBus>) -> Self {
		Self {
			db,
			license,
			events,
		}
	}

	pub async fn list(&self) -> Result<Vec<Job>, OpsError> {
		Ok(JobEntity::find()
			.order_by_desc(job::Column::CreatedAt)
			.all(&self.db)
			.await?)
	}

	pub async fn create_job(&self, input: NewJob) -> Result<Job, OpsError> {
		self.license.check(LicenseAction::CreateJob)?;
		require_non_empty("title", &input.title)?;

		let now = Utc::now();
		let txn = self.db.begin().await?;

		let job = JobActive {
			id: Set(Uuid::new_v4().to_string()),
			title: Set(input.title.trim().to_string()),
			customer: Set(input
				.customer
				.map(|customer| customer.trim().to_string())
				.filter(|customer| !customer.is_empty())),
			status: Set(JobStatus::Open),
			created_at: Set(now),
			updated_at: Set(now),
		}
		.insert(&txn)
		.await?;

		let recorded =
			outbox::record_or_log(&txn, TABLE, ChangeOperation::Insert, &job.id, None, Some(&job))
				.await;
		txn.commit().await?;

		info!(job_id = %job.id, "Created job");
		announce(&self.events, recorded, TABLE, ChangeOperation::Insert, &job.id);

		Ok(job)
	}

	/// Move a job to `status`. Completed and cancelled jobs are final.
	pub async fn update_job_status(&self, id: &str, status: JobStatus) -> Result<Job, OpsError> {
		let txn = self.db.begin().await?;
		let before = JobEntity::find_by_id(id.to_string())
			.one(&txn)
			.await?
			.ok_or_else(|| OpsError::NotFound {
				kind: "job",
				id: id.to_string(),
			})?;

		if before.status == status {
			return Ok(before);
		}
		if matches!(before.status, JobStatus::Completed | JobStatus::Cancelled) {
			return Err(OpsError::InvalidState(format!(
				"job is already {}",
				before.status
			)));
		}

		let mut active = before.clone().into_active_model();
		active.status = Set(status);
		active.updated_at = Set(Utc::now());
		let after = active.update(&txn).await?;

		let recorded = outbox::record_or_log(
			&txn,
			TABLE,
			ChangeOperation::Update,
			&after.id,
			Some(&before),
			Some(&after),
		)
		.await;
		txn.commit().await?;

		info!(job_id = %after.id, from = %before.status, to = %status, "Updated job status");
		announce(&self.events, recorded, TABLE, ChangeOperation::Update, &after.id);

		Ok(after)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		config::LicenseConfig,
		infra::db::entities::ChangesOutbox,
		service::license::{client::VerifyResponse, DeviceIdentity},
		testing::{self, FakeLicenseClient},
	};
	use pretty_assertions::assert_eq;

	async fn ops(status: &str, can_create: bool) -> (tempfile::TempDir, JobOps) {
		let (dir, db) = testing::migrated_db().await;
		let client = Arc::new(FakeLicenseClient::default());
		client.respond(Ok(VerifyResponse {
			status: status.into(),
			can_create_jobs: can_create,
			..VerifyResponse::default()
		}));

		let events = Arc::new(EventBus::default());
		let license = Arc::new(LicenseService::new(
			db.conn().clone(),
			client,
			events.clone(),
			LicenseConfig::default(),
			DeviceIdentity {
				user_id: Some("user-1".into()),
				device_id: "device-1".into(),
				device_name: "bench".into(),
				app_version: "0.1.0".into(),
			},
		));
		license.verify().await.unwrap();

		(dir, JobOps::new(db.conn().clone(), license, events))
	}

	fn install() -> NewJob {
		NewJob {
			title: "Install PA".into(),
			customer: Some("Town Hall".into()),
		}
	}

	#[tokio::test]
	async fn status_change_records_before_and_after() {
		let (_dir, ops) = ops("active", true).await;

		let job = ops.create_job(install()).await.unwrap();
		assert_eq!(job.status, JobStatus::Open);

		let started = ops
			.update_job_status(&job.id, JobStatus::InProgress)
			.await
			.unwrap();

		let entries = ChangesOutbox::find().all(&ops.db).await.unwrap();
		assert_eq!(entries.len(), 2);
		let update = entries
			.iter()
			.find(|entry| entry.operation == ChangeOperation::Update)
			.unwrap();
		assert_eq!(update.old_values, Some(serde_json::to_value(&job).unwrap()));
		assert_eq!(update.new_values, Some(serde_json::to_value(&started).unwrap()));
	}

	#[tokio::test]
	async fn unchanged_status_records_nothing() {
		let (_dir, ops) = ops("active", true).await;
		let job = ops.create_job(install()).await.unwrap();

		ops.update_job_status(&job.id, JobStatus::Open).await.unwrap();

		assert_eq!(ChangesOutbox::find().all(&ops.db).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn finished_jobs_are_final() {
		let (_dir, ops) = ops("active", true).await;
		let job = ops.create_job(install()).await.unwrap();
		ops.update_job_status(&job.id, JobStatus::Cancelled)
			.await
			.unwrap();

		assert!(matches!(
			ops.update_job_status(&job.id, JobStatus::InProgress).await,
			Err(OpsError::InvalidState(_))
		));
	}

	#[tokio::test]
	async fn limited_license_follows_cached_permission() {
		let (_dir, allowed) = ops("limited", true).await;
		assert!(allowed.create_job(install()).await.is_ok());

		let (_dir, denied) = ops("limited", false).await;
		assert!(matches!(
			denied.create_job(install()).await,
			Err(OpsError::NotAllowed {
				action: LicenseAction::CreateJob,
				..
			})
		));
	}

	#[tokio::test]
	async fn restricted_license_denies_even_when_cached_true() {
		let (_dir, ops) = ops("restricted", true).await;

		assert!(matches!(
			ops.create_job(install()).await,
			Err(OpsError::NotAllowed { .. })
		));
		assert!(ops.list().await.unwrap().is_empty());
	}
}
