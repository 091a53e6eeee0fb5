//! hubwire service library entry.
//!
//! Wires the framed connection, the role-specific dispatch loops, strict
//! configuration and the development handler into one runtime. It is consumed
//! by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod services;
pub mod transport;
