//! Fake session handle for exercising the runtime without a paired device.
//!
//! Provides an in-memory [`SessionHandle`] that records every outbound call
//! and a controller that drives state, reachability, error callbacks and
//! inbound delegate callbacks.
//!
//! # Example
//!
//! ```ignore
//! let (handle, mut controller) = FakeSessionBuilder::new().activated().reachable(true).build();
//! let service = SessionService::new(handle, SessionConfig::default());
//! let mut events = service.subscribe();
//!
//! service.send_message(single_entry("k", b"v".to_vec()));
//! assert!(matches!(controller.next_dispatch().await, Some(Dispatch::SendMessage(_))));
//!
//! controller.fail_pending_message(TransportError::new("peer gone"));
//! assert!(events.recv().await.unwrap().failure().is_some());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use pairlink_protocol::{ActivationState, PropertyMap};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::transport::{ErrorHandler, SessionDelegate, SessionHandle, TransportError};

/// An outbound call observed by the fake handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
	Activate,
	SendMessage(PropertyMap),
	TransferUserInfo(PropertyMap),
	UpdateApplicationContext(PropertyMap),
}

/// Builder for creating fake session instances.
#[derive(Debug, Clone)]
pub struct FakeSessionBuilder {
	state: ActivationState,
	reachable: bool,
	complete_activation: bool,
}

impl FakeSessionBuilder {
	/// Starts from a not-activated, unreachable session.
	pub fn new() -> Self {
		Self {
			state: ActivationState::NotActivated,
			reachable: false,
			complete_activation: false,
		}
	}

	pub fn state(mut self, state: ActivationState) -> Self {
		self.state = state;
		self
	}

	pub fn activated(self) -> Self {
		self.state(ActivationState::Activated)
	}

	pub fn reachable(mut self, reachable: bool) -> Self {
		self.reachable = reachable;
		self
	}

	/// When set, `activate()` immediately moves to `Activated` and reports
	/// completion to the delegate, as a healthy pairing would.
	pub fn complete_activation(mut self, complete: bool) -> Self {
		self.complete_activation = complete;
		self
	}

	/// Build the fake handle and return it with its controller.
	pub fn build(self) -> (Arc<FakeSession>, FakeSessionController) {
		let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
		let session = Arc::new(FakeSession {
			state: Mutex::new(self.state),
			reachable: AtomicBool::new(self.reachable),
			complete_activation: self.complete_activation,
			delegate: Mutex::new(None),
			delegate_installs: AtomicUsize::new(0),
			activation_requests: AtomicUsize::new(0),
			pending_errors: Mutex::new(VecDeque::new()),
			context_error: Mutex::new(None),
			dispatch_tx,
		});

		let controller = FakeSessionController {
			session: Arc::clone(&session),
			dispatch_rx,
		};

		(session, controller)
	}
}

impl Default for FakeSessionBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// In-memory [`SessionHandle`].
pub struct FakeSession {
	state: Mutex<ActivationState>,
	reachable: AtomicBool,
	complete_activation: bool,
	delegate: Mutex<Option<Weak<dyn SessionDelegate>>>,
	delegate_installs: AtomicUsize,
	activation_requests: AtomicUsize,
	pending_errors: Mutex<VecDeque<ErrorHandler>>,
	context_error: Mutex<Option<TransportError>>,
	dispatch_tx: mpsc::UnboundedSender<Dispatch>,
}

impl FakeSession {
	fn delegate(&self) -> Option<Arc<dyn SessionDelegate>> {
		self.delegate.lock().as_ref().and_then(Weak::upgrade)
	}

	fn record(&self, dispatch: Dispatch) {
		let _ = self.dispatch_tx.send(dispatch);
	}
}

impl SessionHandle for FakeSession {
	fn set_delegate(&self, delegate: Weak<dyn SessionDelegate>) {
		self.delegate_installs.fetch_add(1, Ordering::SeqCst);
		*self.delegate.lock() = Some(delegate);
	}

	fn activation_state(&self) -> ActivationState {
		*self.state.lock()
	}

	fn is_reachable(&self) -> bool {
		self.reachable.load(Ordering::SeqCst)
	}

	fn activate(&self) {
		self.activation_requests.fetch_add(1, Ordering::SeqCst);
		self.record(Dispatch::Activate);

		if self.complete_activation {
			*self.state.lock() = ActivationState::Activated;
			if let Some(delegate) = self.delegate() {
				delegate.activation_did_complete(ActivationState::Activated, None);
			}
		} else {
			*self.state.lock() = ActivationState::Activating;
		}
	}

	fn send_message(&self, message: PropertyMap, on_error: ErrorHandler) {
		self.pending_errors.lock().push_back(on_error);
		self.record(Dispatch::SendMessage(message));
	}

	fn transfer_user_info(&self, user_info: PropertyMap) {
		self.record(Dispatch::TransferUserInfo(user_info));
	}

	fn update_application_context(&self, context: PropertyMap) -> Result<(), TransportError> {
		self.record(Dispatch::UpdateApplicationContext(context));
		match self.context_error.lock().take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

/// Controller for driving a [`FakeSession`] and inspecting what it was asked to do.
pub struct FakeSessionController {
	session: Arc<FakeSession>,
	dispatch_rx: mpsc::UnboundedReceiver<Dispatch>,
}

impl FakeSessionController {
	pub fn set_state(&self, state: ActivationState) {
		*self.session.state.lock() = state;
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.session.reachable.store(reachable, Ordering::SeqCst);
	}

	/// Makes the next `update_application_context` call fail with `err`.
	pub fn fail_next_context_update(&self, err: TransportError) {
		*self.session.context_error.lock() = Some(err);
	}

	/// Waits for the next outbound call.
	pub async fn next_dispatch(&mut self) -> Option<Dispatch> {
		self.dispatch_rx.recv().await
	}

	/// Returns the next outbound call if one was already recorded.
	pub fn try_next_dispatch(&mut self) -> Option<Dispatch> {
		self.dispatch_rx.try_recv().ok()
	}

	pub fn activation_requests(&self) -> usize {
		self.session.activation_requests.load(Ordering::SeqCst)
	}

	pub fn delegate_installs(&self) -> usize {
		self.session.delegate_installs.load(Ordering::SeqCst)
	}

	pub fn has_delegate(&self) -> bool {
		self.session.delegate().is_some()
	}

	/// Invokes the error handler of the oldest undelivered immediate message.
	///
	/// Returns `false` when no message is pending.
	pub fn fail_pending_message(&self, err: TransportError) -> bool {
		let handler = self.session.pending_errors.lock().pop_front();
		match handler {
			Some(handler) => {
				handler(err);
				true
			}
			None => false,
		}
	}

	/// Sets the state and reports activation completion to the delegate.
	pub fn complete_activation(&self, state: ActivationState, error: Option<TransportError>) {
		self.set_state(state);
		if let Some(delegate) = self.session.delegate() {
			delegate.activation_did_complete(state, error);
		}
	}

	pub fn become_inactive(&self) {
		if let Some(delegate) = self.session.delegate() {
			delegate.session_did_become_inactive();
		}
	}

	pub fn deactivate(&self) {
		self.set_state(ActivationState::NotActivated);
		if let Some(delegate) = self.session.delegate() {
			delegate.session_did_deactivate();
		}
	}

	pub fn deliver_message(&self, message: PropertyMap) {
		if let Some(delegate) = self.session.delegate() {
			delegate.did_receive_message(message);
		}
	}

	/// Delivers a reply-capable message and returns the pending reply.
	pub fn deliver_message_with_reply(&self, message: PropertyMap) -> oneshot::Receiver<PropertyMap> {
		let (tx, rx) = oneshot::channel();
		if let Some(delegate) = self.session.delegate() {
			delegate.did_receive_message_with_reply(
				message,
				Box::new(move |reply| {
					let _ = tx.send(reply);
				}),
			);
		}
		rx
	}

	pub fn deliver_user_info(&self, user_info: PropertyMap) {
		if let Some(delegate) = self.session.delegate() {
			delegate.did_receive_user_info(user_info);
		}
	}

	pub fn deliver_application_context(&self, context: PropertyMap) {
		if let Some(delegate) = self.session.delegate() {
			delegate.did_receive_application_context(context);
		}
	}

	pub fn finish_user_info_transfer(&self, error: Option<TransportError>) {
		if let Some(delegate) = self.session.delegate() {
			delegate.did_finish_user_info_transfer(error);
		}
	}
}
