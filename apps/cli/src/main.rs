use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tether_core::{config::AppConfig, Core};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod context;
mod domains;

use context::{Context, OutputFormat};
use domains::{inventory::InventoryCmd, job::JobCmd};

#[derive(Parser, Debug)]
#[command(name = "tether", about = "Tether local store and sync")]
struct Cli {
	/// Path to the tether data directory
	#[arg(long, env = "TETHER_DATA_DIR")]
	data_dir: Option<PathBuf>,

	/// Output format
	#[arg(long, value_enum, default_value = "human")]
	format: OutputFormat,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Outbox counts and last successful sync
	Status,
	/// List unsynced changes, oldest first
	Pending {
		#[arg(long)]
		limit: Option<u64>,
	},
	/// Show one change entry
	Show { change_id: String },
	/// Push one batch now
	Sync,
	/// Retry failed changes with backoff
	Retry,
	/// Reset a change's attempts and error
	ClearError { change_id: String },
	/// Recent sync runs
	History {
		#[arg(long, default_value_t = 20)]
		limit: u64,
	},
	/// Cached license state
	License,
	/// Verify the license with the license authority
	Verify,
	/// Check whether an action is allowed (sync, create_job, add_inventory)
	Can { action: String },
	/// Applied schema migrations
	Migrations,
	/// Inventory operations
	#[command(subcommand)]
	Inventory(InventoryCmd),
	/// Job operations
	#[command(subcommand)]
	Job(JobCmd),
	/// Run auto-sync and license checks until interrupted
	Daemon,
}

fn init_logging(logs_dir: &Path, level: &str) -> WorkerGuard {
	let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(logs_dir, "tether.log"));

	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("warn,tether_core={level},tether={level}")));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr).with_target(false))
		.with(fmt::layer().with_writer(non_blocking).with_ansi(false))
		.init();

	guard
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let data_dir = match cli.data_dir {
		Some(dir) => dir,
		None => tether_core::config::default_data_dir()?,
	};

	let config = AppConfig::load_or_create(&data_dir)?;
	config.ensure_directories()?;
	let _guard = init_logging(&config.logs_dir(), &config.log_level);

	let core = Core::new_with_config(data_dir).await?;
	let ctx = Context::new(core, cli.format);

	let result = match cli.command {
		Commands::Status => domains::sync::status(&ctx).await,
		Commands::Pending { limit } => domains::sync::pending(&ctx, limit).await,
		Commands::Show { change_id } => domains::sync::show(&ctx, &change_id).await,
		Commands::Sync => domains::sync::sync_now(&ctx).await,
		Commands::Retry => domains::sync::retry(&ctx).await,
		Commands::ClearError { change_id } => domains::sync::clear_error(&ctx, &change_id).await,
		Commands::History { limit } => domains::sync::history(&ctx, limit).await,
		Commands::License => domains::license::show(&ctx).await,
		Commands::Verify => domains::license::verify(&ctx).await,
		Commands::Can { action } => domains::license::can(&ctx, &action),
		Commands::Migrations => domains::sync::migrations(&ctx).await,
		Commands::Inventory(cmd) => domains::inventory::run(&ctx, cmd).await,
		Commands::Job(cmd) => domains::job::run(&ctx, cmd).await,
		Commands::Daemon => domains::daemon::run(&ctx).await,
	};

	ctx.core.shutdown().await?;
	result
}
