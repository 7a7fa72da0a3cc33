//! License verification cache
//!
//! The license authority is asked for an entitlement on a schedule that
//! tightens as trust drops. Its answer is written to the singleton
//! `license_state` row and mirrored in memory, so gating decisions are a
//! plain read with no I/O.

pub mod client;
pub mod state;

pub use client::{HttpLicenseClient, LicenseClient, VerifyRequest, VerifyResponse};
pub use state::{next_verify_delay, LicenseAction, LicenseState};

use crate::{
	config::LicenseConfig,
	infra::{
		db::entities::{
			license_state::{self, LicenseStatus, SINGLETON_ID},
			LicenseStateActive,
		},
		event::{Event, EventBus},
		http::TransportError,
	},
	service::sync::SyncGate,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sea_orm::{sea_query::OnConflict, DatabaseConnection, DbErr, EntityTrait, Set};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LicenseError {
	#[error("database error: {0}")]
	Database(#[from] DbErr),

	#[error("license verification failed: {0}")]
	Transport(#[from] TransportError),

	#[error("no license endpoint is configured")]
	NotConfigured,

	#[error("no user id is configured for license verification")]
	MissingUserId,

	#[error("license status '{status}' does not allow {action}")]
	NotAllowed {
		action: LicenseAction,
		status: LicenseStatus,
	},
}

/// Who is asking the license authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
	pub user_id: Option<String>,
	pub device_id: String,
	pub device_name: String,
	pub app_version: String,
}

impl DeviceIdentity {
	fn request(&self) -> Result<VerifyRequest, LicenseError> {
		let user_id = self
			.user_id
			.clone()
			.filter(|id| !id.trim().is_empty())
			.ok_or(LicenseError::MissingUserId)?;

		Ok(VerifyRequest {
			user_id,
			device_id: self.device_id.clone(),
			device_name: self.device_name.clone(),
			app_version: self.app_version.clone(),
		})
	}
}

struct LicenseCache {
	db: DatabaseConnection,
	client: Arc<dyn LicenseClient>,
	events: Arc<EventBus>,
	identity: DeviceIdentity,

	/// Mirror of the singleton row
	current: RwLock<LicenseState>,
}

impl LicenseCache {
	async fn read_row(&self) -> Result<LicenseState, LicenseError> {
		Ok(license_state::Entity::find_by_id(SINGLETON_ID)
			.one(&self.db)
			.await?
			.unwrap_or_else(LicenseState::unknown))
	}

	async fn verify(&self, request: &VerifyRequest) -> Result<LicenseState, LicenseError> {
		if !self.client.is_configured() {
			return Err(LicenseError::NotConfigured);
		}

		let response = match self.client.verify(request).await {
			Ok(response) => response,
			Err(e) => {
				warn!(
					category = %e.category(),
					error = %e,
					"License verification failed, keeping cached state"
				);
				return Err(e.into());
			}
		};

		let now = Utc::now();
		let status = LicenseStatus::from_remote(&response.status);
		let features = response
			.features
			.iter()
			.map(|(flag, enabled)| (flag.clone(), serde_json::Value::Bool(*enabled)))
			.collect::<serde_json::Map<_, _>>();

		let state = LicenseState {
			id: SINGLETON_ID,
			license_id: response.license_id,
			plan: response.plan,
			status,
			last_verified_at: Some(now),
			next_verify_at: Some(now + next_verify_delay(status)),
			grace_expires_at: response.grace_period.and_then(|grace| grace.expires_at),
			cached_features: serde_json::Value::Object(features),
			cached_sync_enabled: response.sync_enabled,
			cached_can_create_jobs: response.can_create_jobs,
			cached_can_add_inventory: response.can_add_inventory,
		};

		store(&self.db, &state).await?;
		*self.current.write() = state.clone();

		info!(
			status = %status,
			plan = state.plan.as_deref().unwrap_or("-"),
			next_verify_at = ?state.next_verify_at,
			"License verified"
		);
		self.events.emit(Event::LicenseUpdated { status });

		Ok(state)
	}
}

/// Upsert by the fixed key so there is never more than one row
async fn store(db: &DatabaseConnection, state: &LicenseState) -> Result<(), DbErr> {
	use license_state::Column;

	let row = LicenseStateActive {
		id: Set(SINGLETON_ID),
		license_id: Set(state.license_id.clone()),
		plan: Set(state.plan.clone()),
		status: Set(state.status),
		last_verified_at: Set(state.last_verified_at),
		next_verify_at: Set(state.next_verify_at),
		grace_expires_at: Set(state.grace_expires_at.clone()),
		cached_features: Set(state.cached_features.clone()),
		cached_sync_enabled: Set(state.cached_sync_enabled),
		cached_can_create_jobs: Set(state.cached_can_create_jobs),
		cached_can_add_inventory: Set(state.cached_can_add_inventory),
	};

	license_state::Entity::insert(row)
		.on_conflict(
			OnConflict::column(Column::Id)
				.update_columns([
					Column::LicenseId,
					Column::Plan,
					Column::Status,
					Column::LastVerifiedAt,
					Column::NextVerifyAt,
					Column::GraceExpiresAt,
					Column::CachedFeatures,
					Column::CachedSyncEnabled,
					Column::CachedCanCreateJobs,
					Column::CachedCanAddInventory,
				])
				.to_owned(),
		)
		.exec_without_returning(db)
		.await?;

	Ok(())
}

pub struct LicenseService {
	cache: Arc<LicenseCache>,
	config: LicenseConfig,

	/// Whether the scheduler is running
	is_running: Arc<AtomicBool>,

	/// Shutdown signal
	shutdown_tx: Mutex<Option<broadcast::Sender<()>>>,
}

impl LicenseService {
	pub fn new(
		db: DatabaseConnection,
		client: Arc<dyn LicenseClient>,
		events: Arc<EventBus>,
		config: LicenseConfig,
		identity: DeviceIdentity,
	) -> Self {
		Self {
			cache: Arc::new(LicenseCache {
				db,
				client,
				events,
				identity,
				current: RwLock::new(LicenseState::unknown()),
			}),
			config,
			is_running: Arc::new(AtomicBool::new(false)),
			shutdown_tx: Mutex::new(None),
		}
	}

	/// Load the persisted row into memory. Called once at startup.
	pub async fn load(&self) -> Result<LicenseState, LicenseError> {
		let state = self.cache.read_row().await?;
		debug!(status = %state.status, "Loaded cached license state");
		*self.cache.current.write() = state.clone();
		Ok(state)
	}

	/// The persisted license row, or the unknown state if it is missing
	pub async fn get_state(&self) -> Result<LicenseState, LicenseError> {
		self.cache.read_row().await
	}

	/// In-memory copy of the last known state
	pub fn cached(&self) -> LicenseState {
		self.cache.current.read().clone()
	}

	pub fn can_perform(&self, action: LicenseAction) -> bool {
		self.cache.current.read().can_perform(action)
	}

	/// [`Self::can_perform`] as a `Result` for write paths
	pub fn check(&self, action: LicenseAction) -> Result<(), LicenseError> {
		let current = self.cache.current.read();
		if current.can_perform(action) {
			Ok(())
		} else {
			Err(LicenseError::NotAllowed {
				action,
				status: current.status,
			})
		}
	}

	/// Verify as the configured user and device
	pub async fn verify(&self) -> Result<LicenseState, LicenseError> {
		let request = self.cache.identity.request()?;
		self.cache.verify(&request).await
	}

	/// Verify on behalf of an explicit user and device
	pub async fn verify_with(&self, request: VerifyRequest) -> Result<LicenseState, LicenseError> {
		self.cache.verify(&request).await
	}

	/// Verify only if `next_verify_at` has passed
	pub async fn refresh_if_due(&self) -> Result<Option<LicenseState>, LicenseError> {
		if !self.cached().is_verification_due(Utc::now()) {
			return Ok(None);
		}
		self.verify().await.map(Some)
	}

	fn is_configured(&self) -> bool {
		self.cache.client.is_configured() && self.cache.identity.request().is_ok()
	}

	async fn run_scheduler(
		cache: Arc<LicenseCache>,
		config: LicenseConfig,
		is_running: Arc<AtomicBool>,
		mut shutdown_rx: broadcast::Receiver<()>,
	) {
		info!(
			check_interval_secs = config.check_interval_secs,
			"Starting license scheduler"
		);

		let mut ticker = tokio::time::interval(config.check_interval());
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut backoff_until: Option<Instant> = None;

		loop {
			tokio::select! {
				_ = shutdown_rx.recv() => {
					info!("License scheduler shutdown signal received");
					break;
				}
				_ = ticker.tick() => {
					if backoff_until.is_some_and(|until| Instant::now() < until) {
						continue;
					}

					let due = cache.current.read().is_verification_due(Utc::now());
					if !due {
						continue;
					}

					let result = match cache.identity.request() {
						Ok(request) => cache.verify(&request).await,
						Err(e) => Err(e),
					};

					backoff_until = match result {
						Ok(_) => None,
						Err(e) => {
							debug!(
								error = %e,
								retry_in_secs = config.failure_retry_secs,
								"Scheduled license verification failed"
							);
							Some(Instant::now() + config.failure_retry())
						}
					};
				}
			}
		}

		is_running.store(false, Ordering::SeqCst);
		info!("License scheduler stopped");
	}
}

impl SyncGate for LicenseService {
	fn allows_sync(&self) -> bool {
		self.can_perform(LicenseAction::Sync)
	}
}

#[async_trait]
impl crate::service::Service for LicenseService {
	fn name(&self) -> &'static str {
		"license_service"
	}

	fn is_running(&self) -> bool {
		self.is_running.load(Ordering::SeqCst)
	}

	async fn start(&self) -> Result<()> {
		if self.is_running.load(Ordering::SeqCst) {
			warn!("License service already running");
			return Ok(());
		}

		if !self.is_configured() {
			info!("License endpoint or user id not configured, scheduler not started");
			return Ok(());
		}

		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
		*self.shutdown_tx.lock().await = Some(shutdown_tx);

		self.is_running.store(true, Ordering::SeqCst);

		let cache = self.cache.clone();
		let config = self.config.clone();
		let is_running = self.is_running.clone();
		tokio::spawn(async move {
			Self::run_scheduler(cache, config, is_running, shutdown_rx).await;
		});

		info!("License service started");

		Ok(())
	}

	async fn stop(&self) -> Result<()> {
		if !self.is_running.load(Ordering::SeqCst) {
			return Ok(());
		}

		info!("Stopping license service");

		if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
			let _ = shutdown_tx.send(());
		}

		self.is_running.store(false, Ordering::SeqCst);

		info!("License service stopped");

		Ok(())
	}
}
