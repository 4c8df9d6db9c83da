use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the client's setup surface.
///
/// Session traffic never fails through this type; send problems arrive as
/// `SendFailed` events on the subscriber streams.
#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to read config {}: {source}", path.display())]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("invalid config {}: {source}", path.display())]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid value for {name}: {value:?}")]
	InvalidEnv { name: String, value: String },

	#[error("a global client is already installed")]
	GlobalAlreadyInstalled,
}

pub type Result<T> = std::result::Result<T, Error>;
