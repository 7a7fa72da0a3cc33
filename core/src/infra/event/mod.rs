//! Event bus for decoupled communication
//!
//! Services publish what happened; the host (CLI, desktop shell) decides what
//! to show. Emitting never fails, even when nobody is listening.

use crate::infra::db::entities::{changes_outbox::ChangeOperation, license_state::LicenseStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
	/// Core has started
	CoreStarted,

	/// Core is shutting down
	CoreShutdown,

	/// A mutation was captured in the outbox
	ChangeRecorded {
		table: String,
		operation: ChangeOperation,
		record_id: String,
	},

	/// A sync run finished talking to the remote (or found it unreachable)
	SyncCompleted { synced: u64, failed: u64 },

	/// A scheduled sync run was not attempted
	SyncSkipped { reason: String },

	/// The cached license changed after a successful verification
	LicenseUpdated { status: LicenseStatus },
}

/// Event bus for broadcasting events
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<Event>,
}

impl EventBus {
	/// Create a new event bus with specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Emit an event to all current subscribers
	pub fn emit(&self, event: Event) {
		if let Ok(count) = self.sender.send(event) {
			trace!("Event emitted to {} subscribers", count);
		}
	}

	/// Subscribe to all events
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn emit_without_subscribers_does_not_panic() {
		let bus = EventBus::default();
		assert_eq!(bus.subscriber_count(), 0);
		bus.emit(Event::CoreStarted);
	}

	#[tokio::test]
	async fn subscribers_receive_events_in_order() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();

		bus.emit(Event::CoreStarted);
		bus.emit(Event::SyncCompleted {
			synced: 2,
			failed: 1,
		});

		assert_eq!(rx.recv().await.unwrap(), Event::CoreStarted);
		assert_eq!(
			rx.recv().await.unwrap(),
			Event::SyncCompleted {
				synced: 2,
				failed: 1
			}
		);
	}
}
