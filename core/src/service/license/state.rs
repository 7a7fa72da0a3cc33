//! Cached license state and the gating rules evaluated against it

use crate::infra::db::entities::license_state::{self, LicenseStatus, SINGLETON_ID};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The singleton `license_state` row
pub type LicenseState = license_state::Model;

/// Local actions subject to entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseAction {
	Sync,
	CreateJob,
	AddInventory,
}

impl LicenseAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Sync => "sync",
			Self::CreateJob => "create_job",
			Self::AddInventory => "add_inventory",
		}
	}
}

impl fmt::Display for LicenseAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LicenseAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"sync" => Ok(Self::Sync),
			"create_job" => Ok(Self::CreateJob),
			"add_inventory" => Ok(Self::AddInventory),
			other => Err(format!(
				"unknown action '{other}', expected sync, create_job or add_inventory"
			)),
		}
	}
}

/// How long until the next verification, by asserted status.
/// Less trusted states are checked more often.
pub fn next_verify_delay(status: LicenseStatus) -> Duration {
	match status {
		LicenseStatus::Active => Duration::hours(24),
		LicenseStatus::Warning => Duration::hours(2),
		LicenseStatus::Limited => Duration::hours(1),
		LicenseStatus::Restricted | LicenseStatus::Unknown => Duration::minutes(30),
	}
}

impl license_state::Model {
	/// State before any verification has succeeded: everything denied
	pub fn unknown() -> Self {
		Self {
			id: SINGLETON_ID,
			license_id: None,
			plan: None,
			status: LicenseStatus::Unknown,
			last_verified_at: None,
			next_verify_at: None,
			grace_expires_at: None,
			cached_features: serde_json::Value::Object(Default::default()),
			cached_sync_enabled: false,
			cached_can_create_jobs: false,
			cached_can_add_inventory: false,
		}
	}

	/// `restricted` denies everything and `limited` denies sync, whatever the
	/// cached permissions say. Otherwise the cached permission decides.
	pub fn can_perform(&self, action: LicenseAction) -> bool {
		match (self.status, action) {
			(LicenseStatus::Restricted, _) => false,
			(LicenseStatus::Limited, LicenseAction::Sync) => false,
			(_, LicenseAction::Sync) => self.cached_sync_enabled,
			(_, LicenseAction::CreateJob) => self.cached_can_create_jobs,
			(_, LicenseAction::AddInventory) => self.cached_can_add_inventory,
		}
	}

	pub fn is_verification_due(&self, now: DateTime<Utc>) -> bool {
		self.next_verify_at.map_or(true, |at| at <= now)
	}

	/// Whether the server-provided grace expiry is still in the future.
	/// An absent or unparseable expiry means no grace period.
	pub fn in_grace_period(&self, now: DateTime<Utc>) -> bool {
		self.grace_expires_at
			.as_deref()
			.and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
			.is_some_and(|expires| expires.with_timezone(&Utc) > now)
	}

	pub fn feature(&self, name: &str) -> bool {
		self.cached_features
			.get(name)
			.and_then(serde_json::Value::as_bool)
			.unwrap_or(false)
	}
}
