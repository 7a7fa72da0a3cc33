use anyhow::Result;
use tracing::info;

use crate::context::Context;

/// Run the background services until ctrl-c
pub async fn run(ctx: &Context) -> Result<()> {
	ctx.core.start_services().await?;
	info!(
		data_dir = %ctx.core.config().data_dir.display(),
		"Daemon running, press ctrl-c to stop"
	);

	tokio::signal::ctrl_c().await?;
	info!("Shutting down daemon");
	Ok(())
}
