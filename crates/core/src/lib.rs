//! Async client for paired-device messaging sessions.
//!
//! `pairlink` exposes a phone/wearable session as a small async surface: five
//! operations on [`Client`] and a closed [`SessionEvent`] stream that any
//! number of subscribers can consume independently.
//!
//! # Example
//!
//! ```ignore
//! use pairlink::{Client, SessionEvent};
//!
//! let client = Client::new(platform_handle);
//! let mut events = client.subscribe().await;
//!
//! client.activate().await;
//! client.send_message("ping", b"hello".to_vec()).await;
//!
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::SendFailed { reason } = event {
//!         eprintln!("send failed: {reason}");
//!     }
//! }
//! ```
//!
//! # Failure Model
//!
//! Facade calls never fail. Unmet preconditions and transport errors arrive as
//! [`SessionEvent::SendFailed`] on every open stream; inbound payloads that are
//! not all byte buffers arrive with `payload: None`.

pub mod client;
pub mod config;
pub mod error;

pub use client::{Client, SessionConnector};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use pairlink_protocol::{ActivationState, Payload, PropertyMap, PropertyValue, SendFailure, SessionEvent};
pub use pairlink_runtime::{
	Dispatch, EventStream, FakeSession, FakeSessionBuilder, FakeSessionController, SessionConfig, SessionDelegate, SessionHandle, SessionService, SubscriberId,
	TransportError,
};
