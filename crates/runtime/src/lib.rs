//! Session lifecycle and event fan-out for paired-device sessions.
//!
//! [`SessionService`] owns one transport [`SessionHandle`] and one
//! [`EventBus`]. It gates outbound sends on the handle's live activation
//! state, dispatches accepted sends on detached tasks, and, as the handle's
//! sole [`SessionDelegate`], turns every inbound callback into a
//! [`SessionEvent`](pairlink_protocol::SessionEvent) broadcast to all
//! subscribers.

pub mod bus;
pub mod fake;
pub mod service;
pub mod transport;

pub use bus::{EventBus, EventStream, SubscriberId};
pub use fake::{Dispatch, FakeSession, FakeSessionBuilder, FakeSessionController};
pub use service::{SessionConfig, SessionService};
pub use transport::{ErrorHandler, ReplyHandler, SessionDelegate, SessionHandle, TransportError};
