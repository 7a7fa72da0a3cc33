//! Sea-ORM entity definitions
//!
//! These map our domain models to database tables.

pub mod changes_outbox;
pub mod inventory_item;
pub mod job;
pub mod license_state;
pub mod sync_log;

// Re-export all entities
pub use changes_outbox::Entity as ChangesOutbox;
pub use inventory_item::Entity as InventoryItem;
pub use job::Entity as Job;
pub use license_state::Entity as LicenseState;
pub use sync_log::Entity as SyncLog;

// Re-export active models for easy access
pub use changes_outbox::ActiveModel as ChangesOutboxActive;
pub use inventory_item::ActiveModel as InventoryItemActive;
pub use job::ActiveModel as JobActive;
pub use license_state::ActiveModel as LicenseStateActive;
pub use sync_log::ActiveModel as SyncLogActive;
