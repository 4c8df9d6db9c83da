//! Payload shapes exchanged with the transport.
//!
//! Callers hand the session opaque byte buffers keyed by string
//! ([`Payload`]). The transport itself speaks an untyped dictionary
//! ([`PropertyMap`]) whose values may be anything it can carry, so inbound
//! maps must be coerced back into a [`Payload`] and that coercion can fail.

use std::collections::HashMap;

/// Key to opaque byte buffer mapping, as passed by callers.
pub type Payload = HashMap<String, Vec<u8>>;

/// Untyped dictionary as carried by the transport.
pub type PropertyMap = HashMap<String, PropertyValue>;

/// A single value inside a transport dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
	Data(Vec<u8>),
	String(String),
	Integer(i64),
	Real(f64),
	Bool(bool),
	Array(Vec<PropertyValue>),
	Dictionary(PropertyMap),
}

impl PropertyValue {
	/// Returns the raw bytes when this value is a data buffer.
	pub fn as_data(&self) -> Option<&[u8]> {
		match self {
			Self::Data(bytes) => Some(bytes),
			_ => None,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::Data(_) => "data",
			Self::String(_) => "string",
			Self::Integer(_) => "integer",
			Self::Real(_) => "real",
			Self::Bool(_) => "bool",
			Self::Array(_) => "array",
			Self::Dictionary(_) => "dictionary",
		}
	}
}

impl From<Vec<u8>> for PropertyValue {
	fn from(bytes: Vec<u8>) -> Self {
		Self::Data(bytes)
	}
}

impl From<&[u8]> for PropertyValue {
	fn from(bytes: &[u8]) -> Self {
		Self::Data(bytes.to_vec())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<i64> for PropertyValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<f64> for PropertyValue {
	fn from(value: f64) -> Self {
		Self::Real(value)
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

/// Coerces a transport dictionary into a [`Payload`].
///
/// Succeeds only when every value is a data buffer. A single non-data value
/// fails the whole coercion and yields `None`; an empty dictionary coerces
/// to an empty payload.
pub fn coerce_payload(map: &PropertyMap) -> Option<Payload> {
	map.iter()
		.map(|(key, value)| value.as_data().map(|bytes| (key.clone(), bytes.to_vec())))
		.collect()
}

/// Converts a caller payload into the transport's dictionary form.
pub fn into_property_map(payload: Payload) -> PropertyMap {
	payload.into_iter().map(|(key, bytes)| (key, PropertyValue::Data(bytes))).collect()
}

/// Builds a single-entry payload.
pub fn single_entry(key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Payload {
	Payload::from([(key.into(), bytes.into())])
}

/// Serde adapter for `Option<Payload>` encoding each buffer as base64.
pub(crate) mod base64_payload {
	use std::collections::BTreeMap;

	use base64::Engine as _;
	use base64::engine::general_purpose::STANDARD;
	use serde::de::Error as _;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	use super::Payload;

	pub fn serialize<S>(payload: &Option<Payload>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let encoded: Option<BTreeMap<&str, String>> = payload
			.as_ref()
			.map(|payload| payload.iter().map(|(key, bytes)| (key.as_str(), STANDARD.encode(bytes))).collect());
		encoded.serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Payload>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let encoded = Option::<BTreeMap<String, String>>::deserialize(deserializer)?;
		encoded
			.map(|entries| {
				entries
					.into_iter()
					.map(|(key, value)| STANDARD.decode(value.as_bytes()).map(|bytes| (key, bytes)).map_err(D::Error::custom))
					.collect::<Result<Payload, D::Error>>()
			})
			.transpose()
	}
}
