//! Facade behavior against the in-memory session handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use pairlink::{
	ActivationState, Client, ClientConfig, Dispatch, FakeSession, FakeSessionBuilder, FakeSessionController, PropertyMap, PropertyValue, SendFailure,
	SessionConnector, SessionEvent, SessionHandle, TransportError,
};

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn settle() {
	tokio::time::sleep(Duration::from_millis(10)).await;
}

fn connected(builder: FakeSessionBuilder) -> (Client, FakeSessionController) {
	init_tracing();
	let (handle, controller) = builder.build();
	(Client::new(handle), controller)
}

struct CountingConnector {
	handle: Arc<FakeSession>,
	calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionConnector for CountingConnector {
	async fn connect(&self) -> Arc<dyn SessionHandle> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(20)).await;
		self.handle.clone()
	}
}

#[tokio::test]
async fn send_failure_reaches_each_subscriber_exactly_once() {
	let (client, mut controller) = connected(FakeSessionBuilder::new().activated().reachable(true));
	let mut first = client.subscribe().await;
	let mut second = client.subscribe().await;

	client.send_message("k", b"bytes".to_vec()).await;

	let expected = PropertyMap::from([("k".to_string(), PropertyValue::Data(b"bytes".to_vec()))]);
	assert_eq!(controller.next_dispatch().await, Some(Dispatch::SendMessage(expected)));
	settle().await;
	assert_eq!(first.try_recv(), None);
	assert_eq!(second.try_recv(), None);

	assert!(controller.fail_pending_message(TransportError::new("watch app not installed")));

	for events in [&mut first, &mut second] {
		assert_eq!(
			events.try_recv(),
			Some(SessionEvent::send_failed(SendFailure::Other("watch app not installed".into())))
		);
		assert_eq!(events.try_recv(), None);
	}
}

#[tokio::test]
async fn non_byte_inbound_message_has_no_payload() {
	let (client, controller) = connected(FakeSessionBuilder::new().activated());
	let mut events = client.subscribe().await;

	controller.deliver_message(PropertyMap::from([
		("count".to_string(), PropertyValue::Integer(3)),
		("raw".to_string(), PropertyValue::Data(vec![1, 2, 3])),
	]));

	let event = tokio::time::timeout(Duration::from_secs(1), events.next())
		.await
		.expect("event should arrive");
	assert_eq!(event, Some(SessionEvent::MessageReceived { payload: None }));
}

#[tokio::test]
async fn gated_sends_fail_without_dispatch() {
	let (client, mut controller) = connected(FakeSessionBuilder::new().reachable(true));
	let mut events = client.subscribe().await;

	client.send_message("k", b"v".to_vec()).await;
	client.transfer_user_info("k", b"v".to_vec()).await;
	client.update_application_context("k", b"v".to_vec()).await;
	settle().await;

	for _ in 0..3 {
		assert_eq!(events.try_recv(), Some(SessionEvent::send_failed(SendFailure::SessionNotActive)));
	}
	assert_eq!(events.try_recv(), None);
	assert_eq!(controller.try_next_dispatch(), None);
}

#[tokio::test]
async fn unreachable_session_still_accepts_queued_sends() {
	let (client, mut controller) = connected(FakeSessionBuilder::new().activated().reachable(false));
	let mut events = client.subscribe().await;

	client.send_message("k", b"v".to_vec()).await;
	client.transfer_user_info("u", b"1".to_vec()).await;
	client.update_application_context("c", b"2".to_vec()).await;

	assert!(matches!(controller.next_dispatch().await, Some(Dispatch::TransferUserInfo(_))));
	assert!(matches!(controller.next_dispatch().await, Some(Dispatch::UpdateApplicationContext(_))));
	settle().await;

	assert_eq!(events.try_recv(), Some(SessionEvent::send_failed(SendFailure::SessionNotReachable)));
	assert_eq!(events.try_recv(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn service_is_constructed_once_under_concurrent_first_use() {
	init_tracing();
	let (handle, controller) = FakeSessionBuilder::new().activated().build();
	let calls = Arc::new(AtomicUsize::new(0));
	let client = Client::new(CountingConnector {
		handle,
		calls: Arc::clone(&calls),
	});

	let tasks: Vec<_> = (0..8)
		.map(|_| {
			let client = client.clone();
			tokio::spawn(async move { client.subscribe().await })
		})
		.collect();

	let mut streams = Vec::new();
	for task in tasks {
		streams.push(task.await.unwrap());
	}

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert_eq!(controller.delegate_installs(), 1);
	assert_eq!(client.service().await.bus().subscriber_count(), 8);

	let mut ids: Vec<_> = streams.iter().map(|stream| stream.id()).collect();
	ids.sort();
	ids.dedup();
	assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn clones_share_one_service() {
	let (client, _controller) = connected(FakeSessionBuilder::new());
	assert!(!client.is_connected());

	let other = client.clone();
	let a = client.service().await;
	let b = other.service().await;

	assert!(Arc::ptr_eq(&a, &b));
	assert!(other.is_connected());
}

#[tokio::test]
async fn subscriptions_are_independent() {
	let (client, controller) = connected(FakeSessionBuilder::new().activated());
	let mut kept = client.subscribe().await;
	let dropped = client.subscribe().await;
	let service = client.service().await;
	assert_eq!(service.bus().subscriber_count(), 2);

	drop(dropped);
	assert_eq!(service.bus().subscriber_count(), 1);

	controller.become_inactive();
	assert_eq!(kept.try_recv(), Some(SessionEvent::SessionDidBecomeInactive));
}

#[tokio::test]
async fn activate_is_idempotent_once_activated() {
	let (client, mut controller) = connected(FakeSessionBuilder::new().complete_activation(true));
	let mut events = client.subscribe().await;

	client.activate().await;
	assert_eq!(controller.next_dispatch().await, Some(Dispatch::Activate));
	assert_eq!(
		events.recv().await,
		Some(SessionEvent::ActivationDidComplete {
			state: ActivationState::Activated,
			error: None,
		})
	);

	client.activate().await;
	client.activate().await;
	settle().await;
	assert_eq!(controller.activation_requests(), 1);
}

#[tokio::test]
async fn activate_on_connect_requests_activation_after_construction() {
	init_tracing();
	let (handle, controller) = FakeSessionBuilder::new().complete_activation(true).build();
	let config = ClientConfig {
		activate_on_connect: true,
		..Default::default()
	};
	let client = Client::with_config(handle, config);
	assert_eq!(controller.activation_requests(), 0);

	let mut events = client.subscribe().await;
	let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
		.await
		.expect("activation should complete");

	assert_eq!(
		event,
		Some(SessionEvent::ActivationDidComplete {
			state: ActivationState::Activated,
			error: None,
		})
	);
	assert_eq!(controller.activation_requests(), 1);
}

#[tokio::test]
async fn surfaced_transfer_errors_follow_client_config() {
	init_tracing();
	let (handle, mut controller) = FakeSessionBuilder::new().activated().build();
	let config = ClientConfig::from_json_str(r#"{"session":{"surfaceTransferErrors":true}}"#).unwrap();
	let client = Client::with_config(handle, config);
	let mut events = client.subscribe().await;

	client.transfer_user_info("k", b"v".to_vec()).await;
	controller.next_dispatch().await;
	controller.finish_user_info_transfer(Some(TransportError::new("expired")));

	assert_eq!(events.try_recv(), Some(SessionEvent::send_failed(SendFailure::Other("expired".into()))));
}

#[tokio::test]
async fn separate_clients_over_one_handle_share_the_service() {
	init_tracing();
	let (handle, controller) = FakeSessionBuilder::new().activated().build();
	let first = Client::new(handle.clone());
	let second = Client::with_config(handle, ClientConfig::from_json_str(r#"{"session":{"surfaceTransferErrors":true}}"#).unwrap());

	let mut events = first.subscribe().await;
	let shared = second.service().await;

	assert!(Arc::ptr_eq(&first.service().await, &shared));
	assert_eq!(controller.delegate_installs(), 1);
	assert!(!shared.config().surface_transfer_errors);

	controller.deliver_message(PropertyMap::from([("m".to_string(), PropertyValue::Data(b"1".to_vec()))]));
	assert!(matches!(
		events.try_recv(),
		Some(SessionEvent::MessageReceived { payload: Some(_) })
	));
}
