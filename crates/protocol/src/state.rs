//! Transport session activation state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Activation state reported live by the transport session handle.
///
/// `Activated` is terminal from the service's point of view: it never resets
/// a cached copy, it always asks the handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivationState {
	#[default]
	NotActivated,
	Activating,
	Activated,
}

impl ActivationState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::NotActivated => "notActivated",
			Self::Activating => "activating",
			Self::Activated => "activated",
		}
	}

	/// Returns `true` once the session can carry outbound traffic.
	pub fn is_activated(self) -> bool {
		matches!(self, Self::Activated)
	}
}

impl fmt::Display for ActivationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
