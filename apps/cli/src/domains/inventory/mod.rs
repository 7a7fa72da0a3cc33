mod args;

use anyhow::Result;
use clap::Subcommand;
use tether_core::ops::inventory::Item;

use self::args::*;
use crate::context::Context;

#[derive(Subcommand, Debug)]
pub enum InventoryCmd {
	/// Add an item
	Add(ItemAddArgs),
	/// Change an item's name, sku or quantity
	Update(ItemUpdateArgs),
	/// Check an item out
	Checkout(ItemCheckoutArgs),
	/// Return a checked out item
	Return(ItemIdArgs),
	/// Remove an item
	Remove(ItemIdArgs),
	/// List items
	List,
}

fn print_item(ctx: &Context, item: &Item) -> Result<()> {
	ctx.print(item, |item| {
		println!(
			"{} {} [{}] qty={}{}",
			item.id,
			item.name,
			item.sku,
			item.quantity,
			item.checked_out_to
				.as_deref()
				.map(|to| format!(" out to {to}"))
				.unwrap_or_default()
		);
	})
}

pub async fn run(ctx: &Context, cmd: InventoryCmd) -> Result<()> {
	let inventory = ctx.core.inventory();
	match cmd {
		InventoryCmd::Add(args) => {
			let item = inventory.create_item(args.into()).await?;
			print_item(ctx, &item)?;
		}
		InventoryCmd::Update(args) => {
			let item = inventory.update_item(&args.item_id, args.to_update()).await?;
			print_item(ctx, &item)?;
		}
		InventoryCmd::Checkout(args) => {
			let item = inventory.checkout_item(&args.item_id, &args.to).await?;
			print_item(ctx, &item)?;
		}
		InventoryCmd::Return(args) => {
			let item = inventory.return_item(&args.item_id).await?;
			print_item(ctx, &item)?;
		}
		InventoryCmd::Remove(args) => {
			inventory.delete_item(&args.item_id).await?;
			println!("Removed {}", args.item_id);
		}
		InventoryCmd::List => {
			let items = inventory.list().await?;
			ctx.print(&items, |items| {
				if items.is_empty() {
					println!("No items");
				}
				for item in items {
					println!("{} {} [{}] qty={}", item.id, item.name, item.sku, item.quantity);
				}
			})?;
		}
	}
	Ok(())
}
