//! Client configuration.
//!
//! Stored as camelCase JSON. Every field has a default, so a missing file
//! section or an empty object yields [`ClientConfig::default`].
//!
//! ```json
//! {
//!   "session": { "surfaceTransferErrors": true },
//!   "activateOnConnect": true
//! }
//! ```

use std::fs;
use std::path::Path;

use pairlink_runtime::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable overriding [`SessionConfig::surface_transfer_errors`].
pub const ENV_SURFACE_TRANSFER_ERRORS: &str = "PAIRLINK_SURFACE_TRANSFER_ERRORS";

/// Environment variable overriding [`ClientConfig::activate_on_connect`].
pub const ENV_ACTIVATE_ON_CONNECT: &str = "PAIRLINK_ACTIVATE_ON_CONNECT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	#[serde(default)]
	pub session: SessionConfig,
	/// Request activation as soon as the shared service is constructed.
	#[serde(default)]
	pub activate_on_connect: bool,
}

impl ClientConfig {
	/// Reads a JSON config file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(target: "pairlink.client", path = %path.display(), "config loaded");
		Ok(config)
	}

	pub fn from_json_str(content: &str) -> Result<Self> {
		serde_json::from_str(content).map_err(|source| Error::ConfigParse {
			path: "<inline>".into(),
			source,
		})
	}

	/// Applies `PAIRLINK_*` overrides from the process environment.
	pub fn with_env_overrides(self) -> Result<Self> {
		self.with_overrides_from(|name| std::env::var(name).ok())
	}

	/// Applies overrides using `lookup` in place of the process environment.
	pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(value) = flag(&lookup, ENV_SURFACE_TRANSFER_ERRORS)? {
			self.session.surface_transfer_errors = value;
		}
		if let Some(value) = flag(&lookup, ENV_ACTIVATE_ON_CONNECT)? {
			self.activate_on_connect = value;
		}
		Ok(self)
	}
}

fn flag<F>(lookup: &F, name: &str) -> Result<Option<bool>>
where
	F: Fn(&str) -> Option<String>,
{
	let Some(raw) = lookup(name) else {
		return Ok(None);
	};

	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" => Ok(Some(true)),
		"0" | "false" | "no" => Ok(Some(false)),
		_ => Err(Error::InvalidEnv {
			name: name.to_string(),
			value: raw,
		}),
	}
}
