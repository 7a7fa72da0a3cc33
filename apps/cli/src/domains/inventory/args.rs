use clap::Args;
use tether_core::ops::inventory::{ItemUpdate, NewItem};

#[derive(Args, Debug)]
pub struct ItemAddArgs {
	pub name: String,
	#[arg(long)]
	pub sku: String,
	#[arg(long, default_value_t = 1)]
	pub quantity: i32,
}

impl From<ItemAddArgs> for NewItem {
	fn from(args: ItemAddArgs) -> Self {
		Self {
			name: args.name,
			sku: args.sku,
			quantity: args.quantity,
		}
	}
}

#[derive(Args, Debug)]
pub struct ItemUpdateArgs {
	pub item_id: String,
	#[arg(long)]
	pub name: Option<String>,
	#[arg(long)]
	pub sku: Option<String>,
	#[arg(long)]
	pub quantity: Option<i32>,
}

impl ItemUpdateArgs {
	pub fn to_update(&self) -> ItemUpdate {
		ItemUpdate {
			name: self.name.clone(),
			sku: self.sku.clone(),
			quantity: self.quantity,
		}
	}
}

#[derive(Args, Debug)]
pub struct ItemCheckoutArgs {
	pub item_id: String,
	/// Who or where the item goes to
	#[arg(long)]
	pub to: String,
}

#[derive(Args, Debug)]
pub struct ItemIdArgs {
	pub item_id: String,
}
