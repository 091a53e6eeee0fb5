//! Top-level facade crate for hubwire.
//!
//! Re-exports the protocol core and the service library so users can depend on a single crate.

pub mod core {
    pub use hubwire_core::*;
}

pub mod service {
    pub use hubwire_service::*;
}
