//! Indexes for the sync service's pending and retry scans

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		// Pending scan: WHERE synced_at IS NULL ORDER BY created_at
		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_changes_outbox_pending")
					.table(ChangesOutbox::Table)
					.col(ChangesOutbox::SyncedAt)
					.col(ChangesOutbox::CreatedAt)
					.to_owned(),
			)
			.await?;

		// Retry scan: ORDER BY sync_attempts, created_at
		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_changes_outbox_attempts")
					.table(ChangesOutbox::Table)
					.col(ChangesOutbox::SyncAttempts)
					.col(ChangesOutbox::CreatedAt)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.if_not_exists()
					.name("idx_changes_outbox_record")
					.table(ChangesOutbox::Table)
					.col(ChangesOutbox::TableName)
					.col(ChangesOutbox::RecordId)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		for name in [
			"idx_changes_outbox_record",
			"idx_changes_outbox_attempts",
			"idx_changes_outbox_pending",
		] {
			manager
				.drop_index(Index::drop().name(name).table(ChangesOutbox::Table).to_owned())
				.await?;
		}
		Ok(())
	}
}

#[derive(DeriveIden)]
enum ChangesOutbox {
	Table,
	SyncedAt,
	CreatedAt,
	SyncAttempts,
	TableName,
	RecordId,
}
