//! Transport layer (framed byte streams).
//!
//! `Conn` owns one stream and exposes sequential reads plus serialized writes.
//! `tcp` hosts the accept loop used by the service binary.

pub mod conn;
pub mod tcp;

pub use conn::Conn;
