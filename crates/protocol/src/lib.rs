//! Value types for paired-device sessions.
//!
//! This crate holds the vocabulary shared by the session runtime and the
//! application that consumes it: the closed [`SessionEvent`] set, the
//! [`SendFailure`] taxonomy, the transport's [`ActivationState`], and the
//! payload shapes exchanged with the transport.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond conversion and serialization
//! * Closed: Applications switch over [`SessionEvent`] exhaustively
//! * Transport-agnostic: Nothing here knows how bytes reach the peer
//!
//! Session lifecycle and fan-out live in `pairlink-runtime`.

pub mod event;
pub mod payload;
pub mod state;

pub use event::*;
pub use payload::*;
pub use state::*;
