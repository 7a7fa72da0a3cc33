//! License cache entity
//!
//! Singleton row (`id = 1`) holding the last entitlement the license authority
//! asserted for this installation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed primary key of the only row in `license_state`
pub const SINGLETON_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "license_state")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: i32,

	pub license_id: Option<String>,

	pub plan: Option<String>,

	pub status: LicenseStatus,

	pub last_verified_at: Option<DateTimeUtc>,

	pub next_verify_at: Option<DateTimeUtc>,

	/// Stored exactly as the server sent it
	pub grace_expires_at: Option<String>,

	#[sea_orm(column_type = "Json")]
	pub cached_features: Json,

	pub cached_sync_enabled: bool,

	pub cached_can_create_jobs: bool,

	pub cached_can_add_inventory: bool,
}

#[derive(
	Debug,
	Clone,
	Copy,
	Default,
	PartialEq,
	Eq,
	Hash,
	EnumIter,
	DeriveActiveEnum,
	Serialize,
	Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
	#[sea_orm(string_value = "active")]
	Active,
	#[sea_orm(string_value = "warning")]
	Warning,
	#[sea_orm(string_value = "limited")]
	Limited,
	#[sea_orm(string_value = "restricted")]
	Restricted,
	#[default]
	#[sea_orm(string_value = "unknown")]
	Unknown,
}

impl LicenseStatus {
	/// Parse the status string returned by the license authority.
	/// Anything unrecognised is treated as `Unknown`.
	pub fn from_remote(status: &str) -> Self {
		match status.trim().to_ascii_lowercase().as_str() {
			"active" => Self::Active,
			"warning" => Self::Warning,
			"limited" => Self::Limited,
			"restricted" => Self::Restricted,
			_ => Self::Unknown,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Warning => "warning",
			Self::Limited => "limited",
			Self::Restricted => "restricted",
			Self::Unknown => "unknown",
		}
	}
}

impl std::fmt::Display for LicenseStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
