//! Shared fixtures for unit tests

use crate::{
	infra::{db::Database, http::TransportError, outbox::ChangeEntry},
	service::{
		license::client::{LicenseClient, VerifyRequest, VerifyResponse},
		sync::transport::{NetworkProbe, PushResponse, SyncTransport},
	},
};
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
use tokio::sync::Notify;

/// A fresh database file with every migration applied.
///
/// Keep the `TempDir` alive for as long as the database is used.
pub async fn migrated_db() -> (TempDir, Database) {
	let (dir, db) = empty_db().await;
	db.migrate().await.expect("migrations apply");
	(dir, db)
}

/// A fresh database file with no schema at all
pub async fn empty_db() -> (TempDir, Database) {
	let dir = TempDir::new().expect("temp dir");
	let db = Database::create(&dir.path().join("tether.db"))
		.await
		.expect("database opens");
	(dir, db)
}

/// Scripted remote. Without a scripted response every entry is accepted.
pub struct FakeTransport {
	configured: bool,
	responses: Mutex<VecDeque<Result<PushResponse, TransportError>>>,
	pushed: Mutex<Vec<Vec<String>>>,
	hold: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl FakeTransport {
	pub fn configured() -> Self {
		Self {
			configured: true,
			responses: Mutex::new(VecDeque::new()),
			pushed: Mutex::new(Vec::new()),
			hold: Mutex::new(None),
		}
	}

	pub fn unconfigured() -> Self {
		Self {
			configured: false,
			..Self::configured()
		}
	}

	pub fn respond(&self, response: Result<PushResponse, TransportError>) {
		self.responses.lock().push_back(response);
	}

	/// Ids of every batch pushed so far
	pub fn pushed(&self) -> Vec<Vec<String>> {
		self.pushed.lock().clone()
	}

	/// Make the next push signal `entered` and wait for `release`
	pub fn hold(&self, entered: Arc<Notify>, release: Arc<Notify>) {
		*self.hold.lock() = Some((entered, release));
	}
}

#[async_trait]
impl SyncTransport for FakeTransport {
	fn is_configured(&self) -> bool {
		self.configured
	}

	async fn push(&self, changes: &[ChangeEntry]) -> Result<PushResponse, TransportError> {
		self.pushed
			.lock()
			.push(changes.iter().map(|entry| entry.id.clone()).collect());

		let hold = self.hold.lock().take();
		if let Some((entered, release)) = hold {
			entered.notify_one();
			release.notified().await;
		}

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

pub struct FakeProbe {
	reachable: AtomicBool,
}

impl FakeProbe {
	pub fn new(reachable: bool) -> Self {
		Self {
			reachable: AtomicBool::new(reachable),
		}
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.reachable.store(reachable, Ordering::SeqCst);
	}
}

#[async_trait]
impl NetworkProbe for FakeProbe {
	async fn is_reachable(&self) -> bool {
		self.reachable.load(Ordering::SeqCst)
	}
}

/// Scripted license authority. Fails with a network error once the script
/// runs dry.
#[derive(Default)]
pub struct FakeLicenseClient {
	responses: Mutex<VecDeque<Result<VerifyResponse, TransportError>>>,
	requests: Mutex<Vec<VerifyRequest>>,
}

impl FakeLicenseClient {
	pub fn respond(&self, response: Result<VerifyResponse, TransportError>) {
		self.responses.lock().push_back(response);
	}

	pub fn requests(&self) -> Vec<VerifyRequest> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl LicenseClient for FakeLicenseClient {
	fn is_configured(&self) -> bool {
		true
	}

	async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, TransportError> {
		self.requests.lock().push(request.clone());
		let scripted = self.responses.lock().pop_front();
		scripted.unwrap_or_else(|| Err(TransportError::Network("no scripted response".into())))
	}
}
