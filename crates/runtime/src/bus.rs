//! Multi-subscriber event fan-out.
//!
//! The bus keeps one unbounded channel per subscriber, keyed by a
//! [`SubscriberId`] minted at registration. Registration, removal and
//! broadcast all take the same lock, so a broadcast reaches exactly the
//! subscribers registered before it started and none removed before it.
//!
//! Dropping or closing an [`EventStream`] removes its entry. A channel whose
//! receiver vanished without deregistering is pruned by the next broadcast.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use pairlink_protocol::SessionEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Identity of one registration. Never reused within a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "sub-{}", self.0)
	}
}

#[derive(Default)]
struct Registry {
	next_id: u64,
	channels: HashMap<SubscriberId, mpsc::UnboundedSender<SessionEvent>>,
}

impl Registry {
	fn remove(&mut self, id: SubscriberId) -> bool {
		let removed = self.channels.remove(&id).is_some();
		if removed {
			debug!(target: "pairlink.bus", subscriber = %id, remaining = self.channels.len(), "subscriber removed");
		}
		removed
	}
}

/// Fan-out hub shared by the session service and its subscribers.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
	registry: Arc<Mutex<Registry>>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new subscriber and returns its stream.
	pub fn register(&self) -> EventStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let id = {
			let mut registry = self.registry.lock();
			let id = SubscriberId(registry.next_id);
			registry.next_id += 1;
			registry.channels.insert(id, tx);
			id
		};
		debug!(target: "pairlink.bus", subscriber = %id, "subscriber registered");

		EventStream {
			id,
			receiver: rx,
			registry: Arc::downgrade(&self.registry),
		}
	}

	/// Removes a subscriber. Returns `false` if it was already gone.
	pub fn unregister(&self, id: SubscriberId) -> bool {
		self.registry.lock().remove(id)
	}

	/// Delivers `event` to every current subscriber without waiting on any of them.
	///
	/// Returns the number of subscribers the event was queued for.
	pub fn broadcast(&self, event: SessionEvent) -> usize {
		let mut registry = self.registry.lock();
		let mut delivered = 0;
		registry.channels.retain(|id, channel| match channel.send(event.clone()) {
			Ok(()) => {
				delivered += 1;
				true
			}
			Err(_) => {
				trace!(target: "pairlink.bus", subscriber = %id, "pruning closed subscriber");
				false
			}
		});
		trace!(target: "pairlink.bus", event = event.name(), delivered, "event broadcast");
		delivered
	}

	/// Number of live registrations.
	pub fn subscriber_count(&self) -> usize {
		self.registry.lock().channels.len()
	}
}

impl fmt::Debug for EventBus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus").field("subscribers", &self.subscriber_count()).finish()
	}
}

/// One subscriber's view of the session events.
///
/// Yields every event broadcast after registration until it is closed,
/// dropped, or the bus goes away.
#[derive(Debug)]
pub struct EventStream {
	id: SubscriberId,
	receiver: mpsc::UnboundedReceiver<SessionEvent>,
	registry: Weak<Mutex<Registry>>,
}

impl EventStream {
	pub fn id(&self) -> SubscriberId {
		self.id
	}

	/// Waits for the next event. `None` once closed and drained.
	pub async fn recv(&mut self) -> Option<SessionEvent> {
		self.receiver.recv().await
	}

	/// Returns a buffered event without waiting.
	pub fn try_recv(&mut self) -> Option<SessionEvent> {
		self.receiver.try_recv().ok()
	}

	/// Stops accepting new events and deregisters. Already queued events can
	/// still be drained.
	pub fn close(&mut self) {
		self.receiver.close();
		self.deregister();
	}

	fn deregister(&self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.lock().remove(self.id);
		}
	}
}

impl Stream for EventStream {
	type Item = SessionEvent;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		self.get_mut().receiver.poll_recv(cx)
	}
}

impl Drop for EventStream {
	fn drop(&mut self) {
		self.deregister();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use futures_util::StreamExt;
	use pairlink_protocol::SendFailure;

	use super::*;

	fn failed(description: &str) -> SessionEvent {
		SessionEvent::send_failed(SendFailure::Other(description.to_string()))
	}

	#[test]
	fn ids_are_fresh_per_registration() {
		let bus = EventBus::new();
		let a = bus.register();
		let b = bus.register();
		let a_id = a.id();
		drop(a);
		let c = bus.register();

		assert_ne!(a_id, b.id());
		assert_ne!(a_id, c.id());
		assert_ne!(b.id(), c.id());
	}

	#[test]
	fn entry_count_tracks_open_streams() {
		let bus = EventBus::new();
		assert_eq!(bus.subscriber_count(), 0);

		let mut streams: Vec<_> = (0..5).map(|_| bus.register()).collect();
		assert_eq!(bus.subscriber_count(), 5);

		streams.remove(1);
		streams.remove(0);
		assert_eq!(bus.subscriber_count(), 3);

		streams[0].close();
		assert_eq!(bus.subscriber_count(), 2);

		drop(streams);
		assert_eq!(bus.subscriber_count(), 0);
	}

	#[tokio::test]
	async fn broadcast_reaches_every_open_subscriber() {
		let bus = EventBus::new();
		let mut first = bus.register();
		let mut second = bus.register();

		assert_eq!(bus.broadcast(SessionEvent::SessionDidBecomeInactive), 2);

		assert_eq!(first.recv().await, Some(SessionEvent::SessionDidBecomeInactive));
		assert_eq!(second.next().await, Some(SessionEvent::SessionDidBecomeInactive));
	}

	#[test]
	fn broadcast_is_not_retroactive() {
		let bus = EventBus::new();
		let mut early = bus.register();
		bus.broadcast(failed("one"));

		let mut late = bus.register();
		bus.broadcast(failed("two"));

		assert_eq!(early.try_recv(), Some(failed("one")));
		assert_eq!(early.try_recv(), Some(failed("two")));
		assert_eq!(late.try_recv(), Some(failed("two")));
		assert_eq!(late.try_recv(), None);
	}

	#[test]
	fn terminated_subscriber_is_skipped() {
		let bus = EventBus::new();
		let mut kept = bus.register();
		let gone = bus.register();
		drop(gone);

		assert_eq!(bus.broadcast(SessionEvent::SessionDidDeactivate), 1);
		assert_eq!(kept.try_recv(), Some(SessionEvent::SessionDidDeactivate));
	}

	#[test]
	fn double_unregister_is_noop() {
		let bus = EventBus::new();
		let mut stream = bus.register();
		let id = stream.id();

		assert!(bus.unregister(id));
		assert!(!bus.unregister(id));
		stream.close();
		drop(stream);
		assert_eq!(bus.subscriber_count(), 0);
	}

	#[test]
	fn close_keeps_queued_events() {
		let bus = EventBus::new();
		let mut stream = bus.register();
		bus.broadcast(failed("queued"));

		stream.close();
		assert_eq!(bus.broadcast(failed("after")), 0);
		assert_eq!(stream.try_recv(), Some(failed("queued")));
		assert_eq!(stream.try_recv(), None);
	}

	#[tokio::test]
	async fn stream_ends_when_bus_is_dropped() {
		let bus = EventBus::new();
		let mut stream = bus.register();
		drop(bus);

		let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await.expect("stream should end, not hang");
		assert_eq!(next, None);
	}

	#[tokio::test]
	async fn slow_subscriber_does_not_block_broadcast() {
		let bus = EventBus::new();
		let _idle = bus.register();
		let mut active = bus.register();

		for i in 0..1_000 {
			bus.broadcast(failed(&i.to_string()));
		}

		assert_eq!(active.recv().await, Some(failed("0")));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_register_drop_and_broadcast_keep_map_consistent() {
		let bus = EventBus::new();
		let mut kept = Vec::new();
		let mut tasks = Vec::new();

		for worker in 0..8 {
			let bus = bus.clone();
			tasks.push(tokio::spawn(async move {
				let mut survivors = Vec::new();
				for i in 0..50 {
					let stream = bus.register();
					bus.broadcast(failed(&format!("{worker}-{i}")));
					if i % 2 == 0 {
						survivors.push(stream);
					}
					tokio::task::yield_now().await;
				}
				survivors
			}));
		}

		for task in tasks {
			kept.extend(task.await.unwrap());
		}

		assert_eq!(bus.subscriber_count(), kept.len());
		drop(kept);
		assert_eq!(bus.subscriber_count(), 0);
	}
}
