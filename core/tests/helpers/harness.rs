//! A `Core` on a throwaway data directory with scripted remotes

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};
use tempfile::TempDir;
use tether_core::{
	config::AppConfig,
	infra::{http::TransportError, outbox::ChangeEntry},
	service::{
		license::{LicenseClient, LicenseState, VerifyRequest, VerifyResponse},
		sync::{NetworkProbe, PushResponse, SyncTransport},
	},
	Collaborators, Core,
};

/// Accepts every entry unless a response was scripted
#[derive(Default)]
pub struct ScriptedTransport {
	responses: Mutex<VecDeque<Result<PushResponse, TransportError>>>,
	pushed: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
	pub fn respond(&self, response: Result<PushResponse, TransportError>) {
		self.responses.lock().push_back(response);
	}

	pub fn push_count(&self) -> usize {
		self.pushed.lock().len()
	}
}

#[async_trait]
impl SyncTransport for ScriptedTransport {
	fn is_configured(&self) -> bool {
		true
	}

	async fn push(&self, changes: &[ChangeEntry]) -> Result<PushResponse, TransportError> {
		self.pushed
			.lock()
			.push(changes.iter().map(|change| change.id.clone()).collect());

		let scripted = self.responses.lock().pop_front();
		scripted.unwrap_or_else(|| {
			Ok(PushResponse {
				synced: changes.len() as u64,
				failed: 0,
				errors: None,
			})
		})
	}
}

pub struct SwitchProbe(AtomicBool);

impl SwitchProbe {
	pub fn set_online(&self, online: bool) {
		self.0.store(online, Ordering::SeqCst);
	}
}

#[async_trait]
impl NetworkProbe for SwitchProbe {
	async fn is_reachable(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

#[derive(Default)]
pub struct ScriptedLicense {
	responses: Mutex<VecDeque<Result<VerifyResponse, TransportError>>>,
}

impl ScriptedLicense {
	pub fn respond(&self, response: Result<VerifyResponse, TransportError>) {
		self.responses.lock().push_back(response);
	}
}

#[async_trait]
impl LicenseClient for ScriptedLicense {
	fn is_configured(&self) -> bool {
		true
	}

	async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, TransportError> {
		let scripted = self.responses.lock().pop_front();
		scripted.unwrap_or_else(|| Err(TransportError::Network("license authority offline".into())))
	}
}

pub fn entitlement(status: &str, sync: bool, jobs: bool, inventory: bool) -> VerifyResponse {
	VerifyResponse {
		license_id: Some("lic-42".into()),
		plan: Some("studio".into()),
		status: status.into(),
		grace_period: None,
		features: Default::default(),
		sync_enabled: sync,
		can_create_jobs: jobs,
		can_add_inventory: inventory,
	}
}

pub struct Harness {
	pub dir: TempDir,
	pub config: AppConfig,
	pub core: Core,
	pub transport: Arc<ScriptedTransport>,
	pub probe: Arc<SwitchProbe>,
	pub license: Arc<ScriptedLicense>,
}

impl Harness {
	pub async fn new() -> Self {
		let dir = TempDir::new().unwrap();

		let mut config = AppConfig::default_with_dir(dir.path().to_path_buf());
		config.license.user_id = Some("user-1".into());
		config.sync.auto_sync_enabled = false;
		config.sync.retry_base_delay_ms = 1;
		config.sync.max_backoff_secs = 1;

		let transport = Arc::new(ScriptedTransport::default());
		let probe = Arc::new(SwitchProbe(AtomicBool::new(true)));
		let license = Arc::new(ScriptedLicense::default());

		let core = build(&config, &transport, &probe, &license).await;

		Self {
			dir,
			config,
			core,
			transport,
			probe,
			license,
		}
	}

	/// Shut the core down and start a new one on the same data directory
	pub async fn restart(mut self) -> Self {
		self.core.shutdown().await.unwrap();
		self.core = build(&self.config, &self.transport, &self.probe, &self.license).await;
		self
	}

	/// Script one verification response and run it
	pub async fn verify(&self, response: VerifyResponse) -> LicenseState {
		self.license.respond(Ok(response));
		self.core.verify_license().await.unwrap()
	}
}

async fn build(
	config: &AppConfig,
	transport: &Arc<ScriptedTransport>,
	probe: &Arc<SwitchProbe>,
	license: &Arc<ScriptedLicense>,
) -> Core {
	Core::with_collaborators(
		config.clone(),
		Collaborators {
			transport: transport.clone(),
			probe: probe.clone(),
			license_client: license.clone(),
		},
	)
	.await
	.unwrap()
}
