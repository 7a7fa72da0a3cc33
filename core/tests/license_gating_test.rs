//! Entitlement gating against the cached license

mod helpers;

use chrono::Duration;
use helpers::*;
use pretty_assertions::assert_eq;
use tether_core::{
	infra::{db::entities::license_state::LicenseStatus, http::TransportError},
	ops::{inventory::NewItem, jobs::NewJob, OpsError},
	service::license::LicenseAction,
};

fn job() -> NewJob {
	NewJob {
		title: "Wedding reception".into(),
		customer: Some("Rivera".into()),
	}
}

#[tokio::test]
async fn fresh_install_denies_until_verified() {
	let h = Harness::new().await;

	let state = h.core.license_state().await.unwrap();
	assert_eq!(state.status, LicenseStatus::Unknown);
	assert_eq!(state.last_verified_at, None);

	for action in [
		LicenseAction::Sync,
		LicenseAction::CreateJob,
		LicenseAction::AddInventory,
	] {
		assert!(!h.core.can_perform(action));
	}
	assert!(h.core.sync_now().await.unwrap_err().is_not_allowed());
}

#[tokio::test]
async fn limited_denies_sync_and_follows_cached_job_permission() {
	let h = Harness::new().await;
	h.verify(entitlement("limited", true, true, false)).await;

	assert!(!h.core.can_perform(LicenseAction::Sync));
	assert!(h.core.can_perform(LicenseAction::CreateJob));
	assert!(!h.core.can_perform(LicenseAction::AddInventory));

	let err = h.core.sync_now().await.unwrap_err();
	assert!(err.is_not_allowed());
	assert_eq!(h.transport.push_count(), 0);

	h.core.jobs().create_job(job()).await.unwrap();

	h.verify(entitlement("limited", true, false, false)).await;
	assert!(!h.core.can_perform(LicenseAction::CreateJob));
	assert!(matches!(
		h.core.jobs().create_job(job()).await,
		Err(OpsError::NotAllowed { .. })
	));
}

#[tokio::test]
async fn restricted_overrides_cached_permissions() {
	let h = Harness::new().await;
	let state = h.verify(entitlement("restricted", true, true, true)).await;

	for action in [
		LicenseAction::Sync,
		LicenseAction::CreateJob,
		LicenseAction::AddInventory,
	] {
		assert!(!h.core.can_perform(action), "{action} allowed while restricted");
	}

	let err = h
		.core
		.inventory()
		.create_item(NewItem {
			name: "Mixer".into(),
			sku: "MX-8".into(),
			quantity: 1,
		})
		.await
		.unwrap_err();
	assert!(matches!(err, OpsError::NotAllowed { .. }));
	assert!(h.core.pending_changes(None).await.unwrap().is_empty());

	let verified = state.last_verified_at.unwrap();
	assert_eq!(state.next_verify_at, Some(verified + Duration::minutes(30)));
}

#[tokio::test]
async fn adaptive_schedule_follows_status() {
	let h = Harness::new().await;

	let active = h.verify(entitlement("active", true, true, true)).await;
	assert_eq!(
		active.next_verify_at,
		Some(active.last_verified_at.unwrap() + Duration::hours(24))
	);

	let warning = h.verify(entitlement("warning", true, true, true)).await;
	assert_eq!(
		warning.next_verify_at,
		Some(warning.last_verified_at.unwrap() + Duration::hours(2))
	);

	let limited = h.verify(entitlement("limited", true, true, true)).await;
	assert_eq!(
		limited.next_verify_at,
		Some(limited.last_verified_at.unwrap() + Duration::hours(1))
	);
}

#[tokio::test]
async fn failed_verify_keeps_stale_state() {
	let h = Harness::new().await;
	let active = h.verify(entitlement("active", true, true, true)).await;

	h.license
		.respond(Err(TransportError::ConnectionRefused("refused".into())));
	assert!(h.core.verify_license().await.is_err());

	assert_eq!(h.core.license_state().await.unwrap(), active);
	assert!(h.core.can_perform(LicenseAction::Sync));
}
