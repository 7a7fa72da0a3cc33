//! Database migrations
//!
//! Applied in declaration order. Each name is recorded in `schema_migrations`
//! once it succeeds and is never executed again for the same database file.

use sea_orm_migration::prelude::*;

mod m20240101_000001_initial_schema;
mod m20240115_000001_create_business_tables;
mod m20240201_000001_add_outbox_indexes;

/// Name of the migration tracking table
pub const MIGRATION_TABLE: &str = "schema_migrations";

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
	fn migrations() -> Vec<Box<dyn MigrationTrait>> {
		vec![
			Box::new(m20240101_000001_initial_schema::Migration),
			Box::new(m20240115_000001_create_business_tables::Migration),
			Box::new(m20240201_000001_add_outbox_indexes::Migration),
		]
	}

	fn migration_table_name() -> DynIden {
		Alias::new(MIGRATION_TABLE).into_iden()
	}
}
