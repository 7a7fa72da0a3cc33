//! Job entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,
	pub title: String,
	pub customer: Option<String>,
	pub status: JobStatus,
	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	#[sea_orm(string_value = "open")]
	Open,
	#[sea_orm(string_value = "in_progress")]
	InProgress,
	#[sea_orm(string_value = "completed")]
	Completed,
	#[sea_orm(string_value = "cancelled")]
	Cancelled,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Open => "open",
			Self::InProgress => "in_progress",
			Self::Completed => "completed",
			Self::Cancelled => "cancelled",
		}
	}
}

impl std::fmt::Display for JobStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for JobStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"open" => Ok(Self::Open),
			"in_progress" => Ok(Self::InProgress),
			"completed" => Ok(Self::Completed),
			"cancelled" => Ok(Self::Cancelled),
			other => Err(format!("unknown job status '{other}'")),
		}
	}
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
