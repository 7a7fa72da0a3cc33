//! Outbox and sync commands

use super::fmt_time;
use crate::context::Context;
use anyhow::Result;
use tether_core::service::sync::SyncResult;

pub async fn status(ctx: &Context) -> Result<()> {
	let status = ctx.core.sync_status().await?;
	ctx.print(&status, |status| {
		println!("Pending:     {}", status.pending);
		println!("Synced:      {}", status.synced);
		println!("Failed:      {}", status.failed);
		println!("Last sync:   {}", fmt_time(status.last_sync_at));
		if status.in_progress {
			println!("A sync run is in progress");
		}
	})
}

pub async fn pending(ctx: &Context, limit: Option<u64>) -> Result<()> {
	let changes = ctx.core.pending_changes(limit).await?;
	ctx.print(&changes, |changes| {
		if changes.is_empty() {
			println!("Outbox is empty");
		}
		for change in changes {
			println!(
				"{} {:<6} {}/{} attempts={}{}",
				change.id,
				change.operation.as_str(),
				change.table_name,
				change.record_id,
				change.sync_attempts,
				change
					.error
					.as_deref()
					.map(|e| format!(" error={e}"))
					.unwrap_or_default()
			);
		}
	})
}

pub async fn show(ctx: &Context, change_id: &str) -> Result<()> {
	let change = ctx.core.change(change_id).await?;
	ctx.print(&change, |change| {
		println!("Change {}", change.id);
		println!("  {} {}/{}", change.operation, change.table_name, change.record_id);
		println!("  created:  {}", fmt_time(Some(change.created_at)));
		println!("  synced:   {}", fmt_time(change.synced_at));
		println!("  attempts: {}", change.sync_attempts);
		if let Some(error) = &change.error {
			println!("  error:    {error}");
		}
		let fields = change.changed_fields();
		if !fields.is_empty() {
			println!("  changed:  {}", fields.join(", "));
		}
	})
}

fn print_result(ctx: &Context, result: &SyncResult) -> Result<()> {
	ctx.print(result, |result| {
		println!("Synced {} change(s), {} failed", result.synced, result.failed);
		for failure in &result.errors {
			println!("  {}: {}", failure.change_id, failure.error);
		}
	})
}

pub async fn sync_now(ctx: &Context) -> Result<()> {
	let result = ctx.core.sync_now().await?;
	print_result(ctx, &result)
}

pub async fn retry(ctx: &Context) -> Result<()> {
	let result = ctx.core.retry_failed().await?;
	print_result(ctx, &result)
}

pub async fn clear_error(ctx: &Context, change_id: &str) -> Result<()> {
	ctx.core.clear_change_error(change_id).await?;
	println!("Cleared error on {change_id}");
	Ok(())
}

pub async fn history(ctx: &Context, limit: u64) -> Result<()> {
	let runs = ctx.core.sync_history(limit).await?;
	ctx.print(&runs, |runs| {
		if runs.is_empty() {
			println!("No sync runs yet");
		}
		for run in runs {
			println!(
				"{} {:?} pushed={}{}",
				fmt_time(Some(run.sync_at)),
				run.status,
				run.entries_pushed,
				run.error
					.as_deref()
					.map(|e| format!(" error={e}"))
					.unwrap_or_default()
			);
		}
	})
}

pub async fn migrations(ctx: &Context) -> Result<()> {
	let migrations = ctx.core.applied_migrations().await?;
	ctx.print(&migrations, |migrations| {
		for migration in migrations {
			println!("{} {}", fmt_time(migration.applied_at), migration.name);
		}
	})
}
