use anyhow::{anyhow, Result};
use clap::Args;
use tether_core::{infra::db::entities::job::JobStatus, ops::jobs::NewJob};

#[derive(Args, Debug)]
pub struct JobAddArgs {
	pub title: String,
	#[arg(long)]
	pub customer: Option<String>,
}

impl From<JobAddArgs> for NewJob {
	fn from(args: JobAddArgs) -> Self {
		Self {
			title: args.title,
			customer: args.customer,
		}
	}
}

#[derive(Args, Debug)]
pub struct JobStatusArgs {
	pub job_id: String,
	/// open, in_progress, completed or cancelled
	pub status: String,
}

impl JobStatusArgs {
	pub fn status(&self) -> Result<JobStatus> {
		self.status.parse().map_err(|e: String| anyhow!(e))
	}
}
