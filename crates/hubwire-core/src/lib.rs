//! hubwire core: transport-agnostic protocol primitives and the error surface.
//!
//! This crate defines the message catalog, the codec registry, and the
//! length-prefixed framing shared by the service runtime and by tools that
//! speak the gateway protocol. It carries no async runtime so it can be used
//! from any I/O model.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed frames
//! and unregistered kinds surface as `HubError` values, never as crashes.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, HubError, Result};
