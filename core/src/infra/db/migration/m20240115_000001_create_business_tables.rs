//! Inventory and job tables written by the mutation handlers

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(InventoryItems::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(InventoryItems::Id)
							.text()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(InventoryItems::Name).string().not_null())
					.col(
						ColumnDef::new(InventoryItems::Sku)
							.string()
							.not_null()
							.unique_key(),
					)
					.col(
						ColumnDef::new(InventoryItems::Quantity)
							.integer()
							.not_null()
							.default(0),
					)
					.col(ColumnDef::new(InventoryItems::CheckedOutTo).string())
					.col(ColumnDef::new(InventoryItems::CheckedOutAt).timestamp_with_time_zone())
					.col(
						ColumnDef::new(InventoryItems::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(InventoryItems::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(Jobs::Table)
					.if_not_exists()
					.col(ColumnDef::new(Jobs::Id).text().not_null().primary_key())
					.col(ColumnDef::new(Jobs::Title).string().not_null())
					.col(ColumnDef::new(Jobs::Customer).string())
					.col(
						ColumnDef::new(Jobs::Status)
							.string()
							.not_null()
							.default("open"),
					)
					.col(
						ColumnDef::new(Jobs::CreatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.col(
						ColumnDef::new(Jobs::UpdatedAt)
							.timestamp_with_time_zone()
							.not_null(),
					)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(Jobs::Table).to_owned())
			.await?;
		manager
			.drop_table(Table::drop().table(InventoryItems::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum InventoryItems {
	Table,
	Id,
	Name,
	Sku,
	Quantity,
	CheckedOutTo,
	CheckedOutAt,
	CreatedAt,
	UpdatedAt,
}

#[derive(DeriveIden)]
enum Jobs {
	Table,
	Id,
	Title,
	Customer,
	Status,
	CreatedAt,
	UpdatedAt,
}
