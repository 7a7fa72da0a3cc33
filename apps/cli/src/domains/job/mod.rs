mod args;

use anyhow::Result;
use clap::Subcommand;
use tether_core::ops::jobs::Job;

use self::args::*;
use crate::context::Context;

#[derive(Subcommand, Debug)]
pub enum JobCmd {
	/// Create a job
	Add(JobAddArgs),
	/// Move a job to a new status
	Status(JobStatusArgs),
	/// List jobs
	List,
}

fn print_job(ctx: &Context, job: &Job) -> Result<()> {
	ctx.print(job, |job| {
		println!(
			"{} {} ({}){}",
			job.id,
			job.title,
			job.status,
			job.customer
				.as_deref()
				.map(|customer| format!(" for {customer}"))
				.unwrap_or_default()
		);
	})
}

pub async fn run(ctx: &Context, cmd: JobCmd) -> Result<()> {
	let jobs = ctx.core.jobs();
	match cmd {
		JobCmd::Add(args) => {
			let job = jobs.create_job(args.into()).await?;
			print_job(ctx, &job)?;
		}
		JobCmd::Status(args) => {
			let status = args.status()?;
			let job = jobs.update_job_status(&args.job_id, status).await?;
			print_job(ctx, &job)?;
		}
		JobCmd::List => {
			let list = jobs.list().await?;
			ctx.print(&list, |list| {
				if list.is_empty() {
					println!("No jobs");
				}
				for job in list {
					println!("{} {} ({})", job.id, job.title, job.status);
				}
			})?;
		}
	}
	Ok(())
}
