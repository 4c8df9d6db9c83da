//! The closed event vocabulary observed from a session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payload::{Payload, base64_payload};
use crate::state::ActivationState;

/// Why an outbound send did not reach the transport.
///
/// Failures are surfaced as [`SessionEvent::SendFailed`] through the normal
/// event stream, never as return values from the send calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "description", rename_all = "camelCase")]
pub enum SendFailure {
	/// The session has not been activated yet.
	#[error("session is not active")]
	SessionNotActive,
	/// The session is active but the peer device is unreachable.
	#[error("session is not reachable")]
	SessionNotReachable,
	/// The transport reported a failure while sending.
	#[error("{0}")]
	Other(String),
}

/// Everything observable from a paired-device session.
///
/// Events are immutable values with no identity beyond their content. The
/// `payload` of the "received" variants is `None` when the inbound map could
/// not be coerced into byte buffers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
	/// Activation finished; any transport error is folded in as its description.
	#[serde(rename_all = "camelCase")]
	ActivationDidComplete {
		state: ActivationState,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
	SessionDidBecomeInactive,
	/// Only reported on the phone side of the pairing.
	SessionDidDeactivate,
	MessageReceived {
		#[serde(default, with = "base64_payload")]
		payload: Option<Payload>,
	},
	UserInfoReceived {
		#[serde(default, with = "base64_payload")]
		payload: Option<Payload>,
	},
	ApplicationContextReceived {
		#[serde(default, with = "base64_payload")]
		payload: Option<Payload>,
	},
	SendFailed {
		reason: SendFailure,
	},
}

impl SessionEvent {
	/// Stable camelCase name of the variant, for logging.
	pub fn name(&self) -> &'static str {
		match self {
			Self::ActivationDidComplete { .. } => "activationDidComplete",
			Self::SessionDidBecomeInactive => "sessionDidBecomeInactive",
			Self::SessionDidDeactivate => "sessionDidDeactivate",
			Self::MessageReceived { .. } => "messageReceived",
			Self::UserInfoReceived { .. } => "userInfoReceived",
			Self::ApplicationContextReceived { .. } => "applicationContextReceived",
			Self::SendFailed { .. } => "sendFailed",
		}
	}

	pub fn send_failed(reason: SendFailure) -> Self {
		Self::SendFailed { reason }
	}

	/// Returns the failure reason for [`SessionEvent::SendFailed`].
	pub fn failure(&self) -> Option<&SendFailure> {
		match self {
			Self::SendFailed { reason } => Some(reason),
			_ => None,
		}
	}

	/// Returns the coerced payload of a "received" variant.
	///
	/// The outer `Option` is `None` for variants that carry no payload; the
	/// inner one is `None` when coercion failed.
	pub fn received_payload(&self) -> Option<Option<&Payload>> {
		match self {
			Self::MessageReceived { payload } | Self::UserInfoReceived { payload } | Self::ApplicationContextReceived { payload } => Some(payload.as_ref()),
			_ => None,
		}
	}
}
