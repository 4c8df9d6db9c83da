//! Boundary traits for the platform's paired-device session.
//!
//! A platform binding implements [`SessionHandle`] over the OS session
//! object. The runtime implements [`SessionDelegate`] and installs itself as
//! the handle's only callback target when a
//! [`SessionService`](crate::SessionService) is constructed.
//!
//! # Message Flow
//!
//! 1. Service checks [`SessionHandle::activation_state`] and
//!    [`SessionHandle::is_reachable`]
//! 2. Accepted sends call one of the three outbound primitives from a
//!    detached task
//! 3. The handle reports delivery errors through the supplied
//!    [`ErrorHandler`] (immediate messages) or a returned error
//!    (application context)
//! 4. Inbound traffic and lifecycle changes arrive on [`SessionDelegate`]

use std::sync::Weak;

use pairlink_protocol::{ActivationState, PropertyMap};
use thiserror::Error;

/// Failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct TransportError {
	description: String,
}

impl TransportError {
	pub fn new(description: impl Into<String>) -> Self {
		Self { description: description.into() }
	}

	pub fn description(&self) -> &str {
		&self.description
	}
}

/// Called by the handle when an immediate message fails to deliver.
pub type ErrorHandler = Box<dyn FnOnce(TransportError) + Send + 'static>;

/// Answers a reply-capable inbound message.
pub type ReplyHandler = Box<dyn FnOnce(PropertyMap) + Send + 'static>;

/// Outbound surface of the OS session.
///
/// Implementations must be callable from any thread. Outbound primitives
/// should return promptly; the runtime already calls them off the caller's
/// path.
pub trait SessionHandle: Send + Sync {
	/// Installs the single callback target. Called once per service.
	fn set_delegate(&self, delegate: Weak<dyn SessionDelegate>);

	/// Live activation state.
	fn activation_state(&self) -> ActivationState;

	/// Whether the counterpart device can receive immediate messages now.
	fn is_reachable(&self) -> bool;

	/// Requests activation; completion arrives via
	/// [`SessionDelegate::activation_did_complete`].
	fn activate(&self);

	/// Best-effort immediate delivery.
	fn send_message(&self, message: PropertyMap, on_error: ErrorHandler);

	/// Queued delivery; the transport retries until the peer receives it.
	fn transfer_user_info(&self, user_info: PropertyMap);

	/// Replaces the latest application context. Errors only on local failure.
	fn update_application_context(&self, context: PropertyMap) -> Result<(), TransportError>;
}

/// Inbound callback surface of the OS session.
pub trait SessionDelegate: Send + Sync {
	fn activation_did_complete(&self, state: ActivationState, error: Option<TransportError>);

	fn session_did_become_inactive(&self);

	/// Phone side only.
	fn session_did_deactivate(&self);

	fn did_receive_message(&self, message: PropertyMap);

	/// The sender is waiting for `reply`.
	fn did_receive_message_with_reply(&self, message: PropertyMap, reply: ReplyHandler);

	fn did_receive_user_info(&self, user_info: PropertyMap);

	fn did_receive_application_context(&self, context: PropertyMap);

	/// A queued user-info transfer finished, successfully when `error` is `None`.
	///
	/// Not every transport reports this.
	fn did_finish_user_info_transfer(&self, _error: Option<TransportError>) {}
}
