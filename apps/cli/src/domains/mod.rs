pub mod daemon;
pub mod inventory;
pub mod job;
pub mod license;
pub mod sync;

use chrono::{DateTime, Utc};

pub(crate) fn fmt_time(at: Option<DateTime<Utc>>) -> String {
	at.map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
		.unwrap_or_else(|| "never".to_string())
}
