//! Sync log entity
//!
//! Append-only history of sync runs, kept for the operator-facing status view.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_log")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i32,

	pub status: SyncRunStatus,

	pub entries_pushed: i32,

	/// Always zero; this client never pulls
	pub entries_pulled: i32,

	pub error: Option<String>,

	#[sea_orm(indexed)]
	pub sync_at: DateTimeUtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
	/// Every entry in the batch was accepted
	#[sea_orm(string_value = "success")]
	Success,
	/// Some entries were accepted, others rejected
	#[sea_orm(string_value = "partial")]
	Partial,
	/// The request failed or every entry was rejected
	#[sea_orm(string_value = "failed")]
	Failed,
	/// The endpoint was unreachable, nothing was sent
	#[sea_orm(string_value = "offline")]
	Offline,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
