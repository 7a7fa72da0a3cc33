//! Outbox entity
//!
//! One row per local mutation awaiting confirmation from the remote service.
//! `synced_at` stays null until the sync service sees the remote accept the
//! change; `old_values`/`new_values` are written once and never touched again.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "changes_outbox")]
pub struct Model {
	/// Time-ordered UUID (v7) rendered as text
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,

	#[sea_orm(indexed)]
	pub table_name: String,

	pub operation: ChangeOperation,

	pub record_id: String,

	#[sea_orm(column_type = "Json", nullable)]
	pub old_values: Option<Json>,

	#[sea_orm(column_type = "Json", nullable)]
	pub new_values: Option<Json>,

	pub created_at: DateTimeUtc,

	#[sea_orm(indexed, nullable)]
	pub synced_at: Option<DateTimeUtc>,

	pub sync_attempts: i32,

	pub error: Option<String>,
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
	#[sea_orm(string_value = "INSERT")]
	Insert,
	#[sea_orm(string_value = "UPDATE")]
	Update,
	#[sea_orm(string_value = "DELETE")]
	Delete,
}

impl ChangeOperation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Insert => "INSERT",
			Self::Update => "UPDATE",
			Self::Delete => "DELETE",
		}
	}
}

impl std::fmt::Display for ChangeOperation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
