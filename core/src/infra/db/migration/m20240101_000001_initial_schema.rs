//! Baseline schema: outbox, license cache and sync history

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(ChangesOutbox::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(ChangesOutbox::Id)
							.text()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(ChangesOutbox::TableName).string().not_null())
					.col(ColumnDef::new(ChangesOutbox::Operation).string().not_null())
					.col(ColumnDef::new(ChangesOutbox::RecordId).string().not_null())
					.col(ColumnDef::new(ChangesOutbox::OldValues).text())
					.col(ColumnDef::new(ChangesOutbox::NewValues).text())
					.col(
						ColumnDef::new(ChangesOutbox::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(ColumnDef::new(ChangesOutbox::SyncedAt).timestamp_with_time_zone())
					.col(
						ColumnDef::new(ChangesOutbox::SyncAttempts)
							.integer()
							.not_null()
							.default(0),
					)
					.col(ColumnDef::new(ChangesOutbox::Error).text())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(LicenseState::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(LicenseState::Id)
							.integer()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(LicenseState::LicenseId).string())
					.col(ColumnDef::new(LicenseState::Plan).string())
					.col(
						ColumnDef::new(LicenseState::Status)
							.string()
							.not_null()
							.default("unknown"),
					)
					.col(ColumnDef::new(LicenseState::LastVerifiedAt).timestamp_with_time_zone())
					.col(ColumnDef::new(LicenseState::NextVerifyAt).timestamp_with_time_zone())
					.col(ColumnDef::new(LicenseState::GraceExpiresAt).string())
					.col(
						ColumnDef::new(LicenseState::CachedFeatures)
							.text()
							.not_null()
							.default("{}"),
					)
					.col(
						ColumnDef::new(LicenseState::CachedSyncEnabled)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(LicenseState::CachedCanCreateJobs)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(
						ColumnDef::new(LicenseState::CachedCanAddInventory)
							.boolean()
							.not_null()
							.default(false),
					)
					.to_owned(),
			)
			.await?;

		// The singleton row exists from the very first start
		manager
			.exec_stmt(
				Query::insert()
					.into_table(LicenseState::Table)
					.columns([
						LicenseState::Id,
						LicenseState::Status,
						LicenseState::CachedFeatures,
						LicenseState::CachedSyncEnabled,
						LicenseState::CachedCanCreateJobs,
						LicenseState::CachedCanAddInventory,
					])
					.values_panic([
						1.into(),
						"unknown".into(),
						"{}".into(),
						false.into(),
						false.into(),
						false.into(),
					])
					.on_conflict(OnConflict::column(LicenseState::Id).do_nothing().to_owned())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(SyncLog::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(SyncLog::Id)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(SyncLog::Status).string().not_null())
					.col(
						ColumnDef::new(SyncLog::EntriesPushed)
							.integer()
							.not_null()
							.default(0),
					)
					.col(
						ColumnDef::new(SyncLog::EntriesPulled)
							.integer()
							.not_null()
							.default(0),
					)
					.col(ColumnDef::new(SyncLog::Error).text())
					.col(
						ColumnDef::new(SyncLog::SyncAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_sync_log_sync_at")
					.table(SyncLog::Table)
					.col(SyncLog::SyncAt)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(SyncLog::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(LicenseState::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(ChangesOutbox::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum ChangesOutbox {
	Table,
	Id,
	TableName,
	Operation,
	RecordId,
	OldValues,
	NewValues,
	CreatedAt,
	SyncedAt,
	SyncAttempts,
	Error,
}

#[derive(DeriveIden)]
enum LicenseState {
	Table,
	Id,
	LicenseId,
	Plan,
	Status,
	LastVerifiedAt,
	NextVerifyAt,
	GraceExpiresAt,
	CachedFeatures,
	CachedSyncEnabled,
	CachedCanCreateJobs,
	CachedCanAddInventory,
}

#[derive(DeriveIden)]
enum SyncLog {
	Table,
	Id,
	Status,
	EntriesPushed,
	EntriesPulled,
	Error,
	SyncAt,
}
