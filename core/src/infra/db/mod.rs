//! Database infrastructure using SeaORM
//!
//! One embedded SQLite file per installation. The schema is brought up to date
//! by [`Database::migrate`] before anything else touches the connection.

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{
	ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, DbBackend,
	DbErr, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod entities;
pub mod migration;

/// Database wrapper owning the connection pool
#[derive(Clone)]
pub struct Database {
	/// SeaORM database connection
	conn: DatabaseConnection,
}

/// A row of the migration tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
	pub name: String,
	pub applied_at: Option<DateTime<Utc>>,
}

impl Database {
	/// Create (or open, if it already exists) the database at the specified path
	pub async fn create(path: &Path) -> Result<Self, DbErr> {
		// Ensure parent directory exists
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| DbErr::Custom(format!("Failed to create directory: {}", e)))?;
		}

		let db_url = format!("sqlite://{}?mode=rwc", path.display());
		let conn = SeaDatabase::connect(Self::options(db_url)).await?;

		info!("Created database at {:?}", path);

		Ok(Self { conn })
	}

	/// Open an existing database
	pub async fn open(path: &Path) -> Result<Self, DbErr> {
		if !path.exists() {
			return Err(DbErr::Custom(format!(
				"Database does not exist: {}",
				path.display()
			)));
		}

		let db_url = format!("sqlite://{}", path.display());
		let conn = SeaDatabase::connect(Self::options(db_url)).await?;

		info!("Opened database at {:?}", path);

		Ok(Self { conn })
	}

	fn options(db_url: String) -> ConnectOptions {
		let mut opt = ConnectOptions::new(db_url);
		opt.max_connections(4)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(60))
			.sqlx_logging(false); // We'll use tracing instead
		opt
	}

	/// Apply every migration not yet recorded in the tracking table.
	///
	/// All pending migrations run in one transaction, so a failure leaves the
	/// schema exactly as it was. Any failure is returned as-is; callers treat
	/// it as fatal.
	pub async fn migrate(&self) -> Result<(), DbErr> {
		let txn = self.conn.begin().await?;
		migration::Migrator::up(&txn, None).await?;
		txn.commit().await?;
		info!("Database migrations completed successfully");
		Ok(())
	}

	/// Migrations recorded as applied, in application order
	pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, DbErr> {
		let rows = self
			.conn
			.query_all(Statement::from_string(
				DbBackend::Sqlite,
				format!(
					"SELECT version, applied_at FROM {} ORDER BY applied_at, version",
					migration::MIGRATION_TABLE
				),
			))
			.await?;

		rows.into_iter()
			.map(|row| {
				let name: String = row.try_get("", "version")?;
				let applied_at: i64 = row.try_get("", "applied_at")?;
				Ok(AppliedMigration {
					name,
					applied_at: Utc.timestamp_opt(applied_at, 0).single(),
				})
			})
			.collect()
	}

	/// Get the database connection
	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn migrate_twice_is_a_no_op() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("tether.db");

		let db = Database::create(&path).await.unwrap();
		db.migrate().await.unwrap();
		let first = db.applied_migrations().await.unwrap();
		assert_eq!(first.len(), migration::Migrator::migrations().len());

		db.migrate().await.unwrap();
		let second = db.applied_migrations().await.unwrap();
		assert_eq!(first, second);
	}

	#[tokio::test]
	async fn migrate_recovers_from_half_applied_migration() {
		let dir = TempDir::new().unwrap();
		let db = Database::create(&dir.path().join("tether.db")).await.unwrap();

		// Everything but the last migration, plus one of its indexes already
		// created before the run was cut short
		let all = migration::Migrator::migrations().len() as u32;
		migration::Migrator::up(db.conn(), Some(all - 1)).await.unwrap();
		db.conn()
			.execute_unprepared(
				"CREATE INDEX idx_changes_outbox_pending ON changes_outbox (synced_at, created_at)",
			)
			.await
			.unwrap();

		db.migrate().await.unwrap();
		db.migrate().await.unwrap();
		assert_eq!(db.applied_migrations().await.unwrap().len(), all as usize);
	}

	#[tokio::test]
	async fn failed_migration_leaves_nothing_recorded() {
		let dir = TempDir::new().unwrap();
		let db = Database::create(&dir.path().join("tether.db")).await.unwrap();

		// A table the baseline expects to create, with an incompatible shape
		db.conn()
			.execute_unprepared("CREATE TABLE sync_log (id TEXT PRIMARY KEY)")
			.await
			.unwrap();

		assert!(db.migrate().await.is_err());

		let tables = db
			.conn()
			.query_all(Statement::from_string(
				DbBackend::Sqlite,
				"SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('changes_outbox', 'schema_migrations')"
					.to_string(),
			))
			.await
			.unwrap();
		assert!(tables.is_empty());
	}

	#[tokio::test]
	async fn open_missing_database_fails() {
		let dir = TempDir::new().unwrap();
		let result = Database::open(&dir.path().join("missing.db")).await;
		assert!(result.is_err());
	}
}
