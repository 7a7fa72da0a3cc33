use anyhow::Result;
use serde::Serialize;
use tether_core::Core;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
	Human,
	Json,
}

pub struct Context {
	pub core: Core,
	pub format: OutputFormat,
}

impl Context {
	pub fn new(core: Core, format: OutputFormat) -> Self {
		Self { core, format }
	}

	/// Print `value` as pretty JSON, or hand it to `human` for display
	pub fn print<T, F>(&self, value: &T, human: F) -> Result<()>
	where
		T: Serialize,
		F: FnOnce(&T),
	{
		match self.format {
			OutputFormat::Human => human(value),
			OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
		}
		Ok(())
	}
}
