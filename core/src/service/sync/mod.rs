//! Sync service
//!
//! Wraps the [`SyncEngine`] with an auto-sync timer. Manual runs go straight
//! to the engine; both paths share its in-flight guard.

pub mod engine;
pub mod transport;

pub use engine::{
	backoff_delay, ChangeFailure, SyncEngine, SyncError, SyncResult, SyncRun, SyncStatus,
	NETWORK_UNAVAILABLE,
};
pub use transport::{HttpSyncTransport, NetworkProbe, PushResponse, SyncTransport, TcpProbe};

use crate::infra::event::Event;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Decides whether a scheduled sync run may go ahead
pub trait SyncGate: Send + Sync {
	fn allows_sync(&self) -> bool;
}

pub struct SyncService {
	engine: Arc<SyncEngine>,

	/// License gate consulted before every scheduled run
	gate: Option<Arc<dyn SyncGate>>,

	/// Whether the service is running
	is_running: Arc<AtomicBool>,

	/// Shutdown signal
	shutdown_tx: Mutex<Option<broadcast::Sender<()>>>,
}

impl SyncService {
	pub fn new(engine: Arc<SyncEngine>) -> Self {
		Self {
			engine,
			gate: None,
			is_running: Arc::new(AtomicBool::new(false)),
			shutdown_tx: Mutex::new(None),
		}
	}

	pub fn with_gate(mut self, gate: Arc<dyn SyncGate>) -> Self {
		self.gate = Some(gate);
		self
	}

	pub fn engine(&self) -> &Arc<SyncEngine> {
		&self.engine
	}

	/// One scheduled run. Returns whether it left failures behind, which
	/// makes the loop back off before the next run.
	async fn run_scheduled(
		engine: &SyncEngine,
		gate: Option<&dyn SyncGate>,
		previous_failed: bool,
	) -> bool {
		if let Some(gate) = gate {
			if !gate.allows_sync() {
				debug!("License does not allow sync, skipping scheduled run");
				engine.events().emit(Event::SyncSkipped {
					reason: "license does not allow sync".into(),
				});
				return previous_failed;
			}
		}

		match engine.sync_pending().await {
			Ok(result) => result.failed > 0,
			Err(SyncError::InProgress) => {
				debug!("Sync already in progress, skipping scheduled run");
				previous_failed
			}
			Err(SyncError::NotConfigured) => {
				engine.events().emit(Event::SyncSkipped {
					reason: "no sync endpoint configured".into(),
				});
				false
			}
			Err(e) => {
				error!(error = %e, "Scheduled sync run failed");
				true
			}
		}
	}

	async fn run_auto_sync_loop(
		engine: Arc<SyncEngine>,
		gate: Option<Arc<dyn SyncGate>>,
		interval: Duration,
		is_running: Arc<AtomicBool>,
		mut shutdown_rx: broadcast::Receiver<()>,
	) {
		info!(interval_secs = interval.as_secs(), "Starting auto-sync loop");

		let mut ticker = tokio::time::interval(interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut previous_failed = false;

		loop {
			tokio::select! {
				_ = shutdown_rx.recv() => {
					info!("Auto-sync loop shutdown signal received");
					break;
				}
				_ = ticker.tick() => {}
			}

			if previous_failed {
				let delay = match engine.retry_delay(engine.config().max_attempts).await {
					Ok(Some(delay)) => delay,
					Ok(None) => {
						previous_failed = false;
						continue;
					}
					Err(e) => {
						error!(error = %e, "Failed to select changes for retry");
						continue;
					}
				};

				tokio::select! {
					_ = shutdown_rx.recv() => {
						info!("Auto-sync loop shutdown signal received during backoff");
						break;
					}
					_ = tokio::time::sleep(delay) => {}
				}
			}

			// A run that has started is allowed to finish
			previous_failed = Self::run_scheduled(&engine, gate.as_deref(), previous_failed).await;
		}

		is_running.store(false, Ordering::SeqCst);
		info!("Auto-sync loop stopped");
	}
}

#[async_trait]
impl crate::service::Service for SyncService {
	fn name(&self) -> &'static str {
		"sync_service"
	}

	fn is_running(&self) -> bool {
		self.is_running.load(Ordering::SeqCst)
	}

	async fn start(&self) -> Result<()> {
		if self.is_running.load(Ordering::SeqCst) {
			warn!("Sync service already running");
			return Ok(());
		}

		if !self.engine.config().auto_sync_enabled {
			info!("Auto-sync disabled, sync runs only on demand");
			return Ok(());
		}

		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
		*self.shutdown_tx.lock().await = Some(shutdown_tx);

		self.is_running.store(true, Ordering::SeqCst);

		let engine = self.engine.clone();
		let gate = self.gate.clone();
		let interval = engine.config().auto_sync_interval();
		let is_running = self.is_running.clone();
		tokio::spawn(async move {
			Self::run_auto_sync_loop(engine, gate, interval, is_running, shutdown_rx).await;
		});

		info!("Sync service started");

		Ok(())
	}

	async fn stop(&self) -> Result<()> {
		if !self.is_running.load(Ordering::SeqCst) {
			return Ok(());
		}

		info!("Stopping sync service");

		if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
			let _ = shutdown_tx.send(());
		}

		self.is_running.store(false, Ordering::SeqCst);

		info!("Sync service stopped");

		Ok(())
	}
}
