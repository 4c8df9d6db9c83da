//! Session service: gated sends, activation and callback translation.
//!
//! A [`SessionService`] exclusively owns one [`SessionHandle`] and one
//! [`EventBus`]. It installs itself as the handle's delegate when built and
//! from then on every delegate callback becomes exactly one broadcast
//! [`SessionEvent`].
//!
//! Send operations check preconditions against the handle's live state on the
//! caller's path, then hand the actual transport call to a detached task.
//! Failures of any kind come back as [`SessionEvent::SendFailed`].

use std::fmt;
use std::sync::{Arc, Weak};

use pairlink_protocol::{ActivationState, Payload, PropertyMap, PropertyValue, SendFailure, SessionEvent, coerce_payload, into_property_map};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::bus::{EventBus, EventStream};
use crate::transport::{ReplyHandler, SessionDelegate, SessionHandle, TransportError};

/// Live services keyed by the address of the handle they own.
///
/// A live service keeps its handle alive, so an address cannot be reused
/// while its entry upgrades.
static SERVICES: Mutex<Vec<(usize, Weak<SessionService>)>> = parking_lot::const_mutex(Vec::new());

fn handle_key(handle: &Arc<dyn SessionHandle>) -> usize {
	Arc::as_ptr(handle) as *const () as usize
}

/// Runtime behavior switches for a [`SessionService`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
	/// Surface failed user-info transfers as `SendFailed(Other)`.
	///
	/// Off by default: queued transfers only ever fail locally with
	/// `SessionNotActive`.
	pub surface_transfer_errors: bool,
}

/// Owns the transport handle and the subscriber bus.
pub struct SessionService {
	handle: Arc<dyn SessionHandle>,
	bus: EventBus,
	config: SessionConfig,
	runtime: Option<Handle>,
}

impl SessionService {
	/// Returns the service for `handle`, building it on first use.
	///
	/// At most one service is live per handle, and it is the handle's only
	/// delegate. While that service is alive, later calls return it unchanged
	/// and `config` is ignored.
	pub fn new(handle: Arc<dyn SessionHandle>, config: SessionConfig) -> Arc<Self> {
		let key = handle_key(&handle);
		let mut services = SERVICES.lock();
		services.retain(|(_, service)| service.strong_count() > 0);

		if let Some(existing) = services.iter().filter(|(entry, _)| *entry == key).find_map(|(_, service)| service.upgrade()) {
			debug!(target: "pairlink.session", "reusing live session service");
			return existing;
		}

		let service = Self::build(handle, config);
		services.push((key, Arc::downgrade(&service)));
		service
	}

	fn build(handle: Arc<dyn SessionHandle>, config: SessionConfig) -> Arc<Self> {
		let service = Arc::new(Self {
			handle,
			bus: EventBus::new(),
			config,
			runtime: Handle::try_current().ok(),
		});

		let weak = Arc::downgrade(&service);
		let delegate: Weak<dyn SessionDelegate> = weak;
		service.handle.set_delegate(delegate);
		debug!(
			target: "pairlink.session",
			state = %service.handle.activation_state(),
			surface_transfer_errors = service.config.surface_transfer_errors,
			detached = service.runtime.is_some(),
			"session service ready"
		);

		service
	}

	/// Registers a new subscriber.
	pub fn subscribe(&self) -> EventStream {
		self.bus.register()
	}

	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn activation_state(&self) -> ActivationState {
		self.handle.activation_state()
	}

	pub fn is_reachable(&self) -> bool {
		self.handle.is_reachable()
	}

	/// Requests activation unless the handle already reports `Activated`.
	///
	/// Completion is reported later as [`SessionEvent::ActivationDidComplete`].
	pub fn activate(&self) {
		if self.handle.activation_state().is_activated() {
			debug!(target: "pairlink.session", "already activated");
			return;
		}

		debug!(target: "pairlink.session", "requesting activation");
		let handle = Arc::clone(&self.handle);
		self.detach(move || handle.activate());
	}

	/// Best-effort immediate delivery.
	///
	/// Requires an activated and reachable session. Delivery errors reported
	/// by the transport become `SendFailed(Other)`; success is silent.
	pub fn send_message(&self, payload: Payload) {
		if !self.require_activated("sendMessage") {
			return;
		}
		if !self.handle.is_reachable() {
			self.reject("sendMessage", SendFailure::SessionNotReachable);
			return;
		}

		let handle = Arc::clone(&self.handle);
		let bus = self.bus.clone();
		let message = into_property_map(payload);
		self.detach(move || {
			handle.send_message(
				message,
				Box::new(move |err| {
					warn!(target: "pairlink.session", error = %err, "message delivery failed");
					bus.broadcast(SessionEvent::send_failed(SendFailure::Other(err.to_string())));
				}),
			);
		});
	}

	/// Queued delivery. Only requires an activated session.
	pub fn transfer_user_info(&self, payload: Payload) {
		if !self.require_activated("transferUserInfo") {
			return;
		}

		let handle = Arc::clone(&self.handle);
		let user_info = into_property_map(payload);
		self.detach(move || handle.transfer_user_info(user_info));
	}

	/// Replaces the latest application context. Only requires an activated session.
	pub fn update_application_context(&self, payload: Payload) {
		if !self.require_activated("updateApplicationContext") {
			return;
		}

		let handle = Arc::clone(&self.handle);
		let bus = self.bus.clone();
		let context = into_property_map(payload);
		self.detach(move || {
			if let Err(err) = handle.update_application_context(context) {
				warn!(target: "pairlink.session", error = %err, "application context update failed");
				bus.broadcast(SessionEvent::send_failed(SendFailure::Other(err.to_string())));
			}
		});
	}

	/// Runs a transport call off the caller's path.
	///
	/// Uses the runtime the service was built on, else the caller's runtime.
	/// With neither available the call runs inline.
	fn detach<F>(&self, call: F)
	where
		F: FnOnce() + Send + 'static,
	{
		match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
			Some(runtime) => {
				runtime.spawn(async move { call() });
			}
			None => {
				debug!(target: "pairlink.session", "no tokio runtime, calling transport inline");
				call();
			}
		}
	}

	fn require_activated(&self, operation: &'static str) -> bool {
		let state = self.handle.activation_state();
		if state.is_activated() {
			return true;
		}
		debug!(target: "pairlink.session", operation, %state, "session not active");
		self.reject(operation, SendFailure::SessionNotActive);
		false
	}

	fn reject(&self, operation: &'static str, reason: SendFailure) {
		debug!(target: "pairlink.session", operation, reason = %reason, "send rejected");
		self.bus.broadcast(SessionEvent::send_failed(reason));
	}

	fn received(&self, kind: &'static str, map: &PropertyMap) -> Option<Payload> {
		let payload = coerce_payload(map);
		match &payload {
			Some(_) => debug!(target: "pairlink.session", kind, keys = map.len(), "inbound payload"),
			None => {
				let rejected = map.values().find(|value| value.as_data().is_none()).map_or("none", PropertyValue::kind);
				debug!(target: "pairlink.session", kind, keys = map.len(), rejected, "inbound payload is not all data");
			}
		}
		payload
	}
}

impl SessionDelegate for SessionService {
	fn activation_did_complete(&self, state: ActivationState, error: Option<TransportError>) {
		match &error {
			Some(err) => warn!(target: "pairlink.session", %state, error = %err, "activation completed with error"),
			None => debug!(target: "pairlink.session", %state, "activation completed"),
		}
		self.bus.broadcast(SessionEvent::ActivationDidComplete {
			state,
			error: error.map(|err| err.to_string()),
		});
	}

	fn session_did_become_inactive(&self) {
		debug!(target: "pairlink.session", "session became inactive");
		self.bus.broadcast(SessionEvent::SessionDidBecomeInactive);
	}

	fn session_did_deactivate(&self) {
		debug!(target: "pairlink.session", "session deactivated");
		self.bus.broadcast(SessionEvent::SessionDidDeactivate);
	}

	fn did_receive_message(&self, message: PropertyMap) {
		let payload = self.received("message", &message);
		self.bus.broadcast(SessionEvent::MessageReceived { payload });
	}

	fn did_receive_message_with_reply(&self, message: PropertyMap, reply: ReplyHandler) {
		let payload = self.received("message", &message);
		reply(message);
		self.bus.broadcast(SessionEvent::MessageReceived { payload });
	}

	fn did_receive_user_info(&self, user_info: PropertyMap) {
		let payload = self.received("userInfo", &user_info);
		self.bus.broadcast(SessionEvent::UserInfoReceived { payload });
	}

	fn did_receive_application_context(&self, context: PropertyMap) {
		let payload = self.received("applicationContext", &context);
		self.bus.broadcast(SessionEvent::ApplicationContextReceived { payload });
	}

	fn did_finish_user_info_transfer(&self, error: Option<TransportError>) {
		let Some(err) = error else {
			return;
		};

		if self.config.surface_transfer_errors {
			warn!(target: "pairlink.session", error = %err, "user info transfer failed");
			self.bus.broadcast(SessionEvent::send_failed(SendFailure::Other(err.to_string())));
		} else {
			debug!(target: "pairlink.session", error = %err, "user info transfer failed, not surfaced");
		}
	}
}

impl fmt::Debug for SessionService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionService")
			.field("state", &self.handle.activation_state())
			.field("bus", &self.bus)
			.field("config", &self.config)
			.finish()
	}
}
