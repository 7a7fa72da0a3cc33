//! Inventory handlers

use super::{announce, require_non_empty, OpsError};
use crate::{
	infra::{
		db::entities::{
			changes_outbox::ChangeOperation, inventory_item, InventoryItem, InventoryItemActive,
		},
		event::EventBus,
		outbox,
	},
	service::license::{LicenseAction, LicenseService},
};
use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder,
	Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const TABLE: &str = "inventory_items";

pub type Item = inventory_item::Model;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
	pub name: String,
	pub sku: String,
	pub quantity: i32,
}

impl NewItem {
	pub fn validate(&self) -> Result<(), OpsError> {
		require_non_empty("name", &self.name)?;
		require_non_empty("sku", &self.sku)?;
		if self.quantity < 0 {
			return Err(OpsError::validation("quantity", "must not be negative"));
		}
		Ok(())
	}
}

/// Fields left as `None` keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
	pub name: Option<String>,
	pub sku: Option<String>,
	pub quantity: Option<i32>,
}

impl ItemUpdate {
	pub fn validate(&self) -> Result<(), OpsError> {
		if let Some(name) = &self.name {
			require_non_empty("name", name)?;
		}
		if let Some(sku) = &self.sku {
			require_non_empty("sku", sku)?;
		}
		if self.quantity.is_some_and(|quantity| quantity < 0) {
			return Err(OpsError::validation("quantity", "must not be negative"));
		}
		Ok(())
	}
}

#[derive(Clone)]
pub struct InventoryOps {
	db: DatabaseConnection,
	license: Arc<LicenseService>,
	events: Arc<EventBus>,
}

impl InventoryOps {
	pub fn new(db: DatabaseConnection, license: Arc<LicenseService>, events: Arc<EventBus>) -> Self {
		Self {
			db,
			license,
			events,
		}
	}

	pub async fn list(&self) -> Result<Vec<Item>, OpsError> {
		Ok(InventoryItem::find()
			.order_by_asc(inventory_item::Column::Name)
			.all(&self.db)
			.await?)
	}

	pub async fn get(&self, id: &str) -> Result<Item, OpsError> {
		find(&self.db, id).await
	}

	pub async fn create_item(&self, input: NewItem) -> Result<Item, OpsError> {
		self.license.check(LicenseAction::AddInventory)?;
		input.validate()?;

		let now = Utc::now();
		let txn = self.db.begin().await?;

		let item = InventoryItemActive {
			id: Set(Uuid::new_v4().to_string()),
			name: Set(input.name.trim().to_string()),
			sku: Set(input.sku.trim().to_string()),
			quantity: Set(input.quantity),
			checked_out_to: Set(None),
			checked_out_at: Set(None),
			created_at: Set(now),
			updated_at: Set(now),
		}
		.insert(&txn)
		.await?;

		let recorded = outbox::record_or_log(
			&txn,
			TABLE,
			ChangeOperation::Insert,
			&item.id,
			None,
			Some(&item),
		)
		.await;
		txn.commit().await?;

		info!(item_id = %item.id, sku = %item.sku, "Created inventory item");
		announce(&self.events, recorded, TABLE, ChangeOperation::Insert, &item.id);

		Ok(item)
	}

	pub async fn update_item(&self, id: &str, update: ItemUpdate) -> Result<Item, OpsError> {
		update.validate()?;

		self.modify(id, |_, active| {
			if let Some(name) = update.name {
				active.name = Set(name.trim().to_string());
			}
			if let Some(sku) = update.sku {
				active.sku = Set(sku.trim().to_string());
			}
			if let Some(quantity) = update.quantity {
				active.quantity = Set(quantity);
			}
			Ok(())
		})
		.await
	}

	pub async fn checkout_item(&self, id: &str, to: &str) -> Result<Item, OpsError> {
		require_non_empty("checked_out_to", to)?;

		self.modify(id, |current, active| {
			if let Some(holder) = &current.checked_out_to {
				return Err(OpsError::InvalidState(format!(
					"item is already checked out to {holder}"
				)));
			}
			active.checked_out_to = Set(Some(to.trim().to_string()));
			active.checked_out_at = Set(Some(Utc::now()));
			Ok(())
		})
		.await
	}

	pub async fn return_item(&self, id: &str) -> Result<Item, OpsError> {
		self.modify(id, |current, active| {
			if current.checked_out_to.is_none() {
				return Err(OpsError::InvalidState("item is not checked out".into()));
			}
			active.checked_out_to = Set(None);
			active.checked_out_at = Set(None);
			Ok(())
		})
		.await
	}

	pub async fn delete_item(&self, id: &str) -> Result<(), OpsError> {
		let txn = self.db.begin().await?;
		let existing = find(&txn, id).await?;

		InventoryItem::delete_by_id(existing.id.clone())
			.exec(&txn)
			.await?;

		let recorded = outbox::record_or_log(
			&txn,
			TABLE,
			ChangeOperation::Delete,
			&existing.id,
			Some(&existing),
			None,
		)
		.await;
		txn.commit().await?;

		info!(item_id = %existing.id, "Deleted inventory item");
		announce(&self.events, recorded, TABLE, ChangeOperation::Delete, &existing.id);

		Ok(())
	}

	/// Load, change and save one item, recording the before and after
	/// snapshots. A rejected change rolls back when the transaction drops.
	async fn modify<F>(&self, id: &str, change: F) -> Result<Item, OpsError>
	where
		F: FnOnce(&Item, &mut InventoryItemActive) -> Result<(), OpsError>,
	{
		let txn = self.db.begin().await?;
		let before = find(&txn, id).await?;

		let mut active = before.clone().into_active_model();
		change(&before, &mut active)?;
		active.updated_at = Set(Utc::now());
		let after = active.update(&txn).await?;

		let recorded = outbox::record_or_log(
			&txn,
			TABLE,
			ChangeOperation::Update,
			&after.id,
			Some(&before),
			Some(&after),
		)
		.await;
		txn.commit().await?;

		announce(&self.events, recorded, TABLE, ChangeOperation::Update, &after.id);

		Ok(after)
	}
}

async fn find<C: ConnectionTrait>(db: &C, id: &str) -> Result<Item, OpsError> {
	InventoryItem::find_by_id(id.to_string())
		.one(db)
		.await?
		.ok_or_else(|| OpsError::NotFound {
			kind: "inventory item",
			id: id.to_string(),
		})
}
