//! License cache commands

use super::fmt_time;
use crate::context::Context;
use anyhow::{anyhow, Result};
use serde_json::json;
use tether_core::service::license::{LicenseAction, LicenseState};

fn print_state(ctx: &Context, state: &LicenseState) -> Result<()> {
	ctx.print(state, |state| {
		println!("Status:        {}", state.status);
		println!("Plan:          {}", state.plan.as_deref().unwrap_or("-"));
		println!("License:       {}", state.license_id.as_deref().unwrap_or("-"));
		println!("Last verified: {}", fmt_time(state.last_verified_at));
		println!("Next check:    {}", fmt_time(state.next_verify_at));
		if let Some(grace) = &state.grace_expires_at {
			println!("Grace until:   {grace}");
		}
		println!("Sync:          {}", state.cached_sync_enabled);
		println!("Create jobs:   {}", state.cached_can_create_jobs);
		println!("Add inventory: {}", state.cached_can_add_inventory);
	})
}

pub async fn show(ctx: &Context) -> Result<()> {
	let state = ctx.core.license_state().await?;
	print_state(ctx, &state)
}

pub async fn verify(ctx: &Context) -> Result<()> {
	let state = ctx.core.verify_license().await?;
	print_state(ctx, &state)
}

pub fn can(ctx: &Context, action: &str) -> Result<()> {
	let action: LicenseAction = action.parse().map_err(|e: String| anyhow!(e))?;
	let allowed = ctx.core.can_perform(action);
	ctx.print(&json!({ "action": action, "allowed": allowed }), |_| {
		if allowed {
			println!("{action}: allowed");
		} else {
			println!("{action}: not allowed");
		}
	})
}
