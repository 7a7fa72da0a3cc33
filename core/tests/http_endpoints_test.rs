//! The default HTTP collaborators against local stand-in endpoints

mod helpers;

use helpers::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tether_core::{
	config::AppConfig,
	infra::db::entities::license_state::LicenseStatus,
	ops::inventory::NewItem,
	service::license::LicenseAction,
	Core,
};

fn item(sku: &str) -> NewItem {
	NewItem {
		name: format!("Cable {sku}"),
		sku: sku.into(),
		quantity: 10,
	}
}

#[tokio::test]
async fn verify_and_sync_over_http() {
	let (license_addr, license_requests) = serve_json(vec![(
		200,
		json!({
			"license_id": "lic-9",
			"plan": "studio",
			"status": "active",
			"grace_period": { "expires_at": null },
			"features": { "reports": true },
			"sync_enabled": true,
			"can_create_jobs": true,
			"can_add_inventory": true
		})
		.to_string(),
	)])
	.await;

	let dir = TempDir::new().unwrap();
	let mut config = AppConfig::default_with_dir(dir.path().to_path_buf());
	config.license.endpoint = Some(format!("http://{license_addr}/license/verify"));
	config.license.user_id = Some("user-9".into());
	config.sync.auto_sync_enabled = false;
	config.save().unwrap();

	// No sync endpoint yet
	let core = Core::new_with_config(dir.path().to_path_buf())
		.await
		.unwrap();

	let state = core.verify_license().await.unwrap();
	assert_eq!(state.status, LicenseStatus::Active);
	assert!(core.can_perform(LicenseAction::AddInventory));

	let request: Value = serde_json::from_str(&license_requests.await.unwrap()[0]).unwrap();
	assert_eq!(request["userId"], "user-9");
	assert_eq!(request["deviceId"], config.device_id.to_string());

	core.inventory().create_item(item("XLR-3")).await.unwrap();
	assert!(core.sync_now().await.is_err());
	core.shutdown().await.unwrap();

	// Point sync at a stand-in that rejects nothing
	let (sync_addr, sync_requests) =
		serve_json(vec![(200, json!({ "synced": 2, "failed": 0 }).to_string())]).await;
	config.sync.endpoint = Some(format!("http://{sync_addr}/changes"));
	config.save().unwrap();

	let core = Core::new_with_config(dir.path().to_path_buf())
		.await
		.unwrap();
	assert!(core.can_perform(LicenseAction::Sync));

	core.inventory().create_item(item("XLR-6")).await.unwrap();
	let result = core.sync_now().await.unwrap();
	assert_eq!((result.synced, result.failed), (2, 0));

	let body: Value = serde_json::from_str(&sync_requests.await.unwrap()[0]).unwrap();
	let changes = body["changes"].as_array().unwrap();
	assert_eq!(changes.len(), 2);
	assert_eq!(changes[0]["tableName"], "inventory_items");
	assert_eq!(changes[0]["operation"], "INSERT");
	assert_eq!(changes[0]["newValues"]["sku"], "XLR-3");
	assert_eq!(changes[1]["newValues"]["sku"], "XLR-6");

	assert_eq!(core.sync_status().await.unwrap().synced, 2);
}

#[tokio::test]
async fn unreachable_endpoint_leaves_changes_pending() {
	let dir = TempDir::new().unwrap();
	let mut config = AppConfig::default_with_dir(dir.path().to_path_buf());

	// Bound then dropped, so nothing listens there
	let closed = std::net::TcpListener::bind("127.0.0.1:0")
		.unwrap()
		.local_addr()
		.unwrap();
	config.sync.endpoint = Some(format!("http://{closed}/changes"));
	config.sync.probe_timeout_secs = 1;
	config.sync.auto_sync_enabled = false;
	config.save().unwrap();

	let core = Core::new_with_config(dir.path().to_path_buf())
		.await
		.unwrap();

	// Bypass the license gate and drive the engine directly
	let engine = core.sync_engine();
	tether_core::infra::outbox::record(
		core.database().conn(),
		"jobs",
		tether_core::infra::db::entities::changes_outbox::ChangeOperation::Insert,
		"job-1",
		None,
		Some(&json!({ "title": "Load-in" })),
	)
	.await
	.unwrap();

	let result = engine.sync_pending().await.unwrap();
	assert_eq!(result.failed, 1);

	let pending = engine.get_pending_changes(10).await.unwrap();
	assert_eq!(pending[0].sync_attempts, 1);
	assert_eq!(pending[0].synced_at, None);
}
