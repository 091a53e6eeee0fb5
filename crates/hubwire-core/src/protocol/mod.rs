//! Protocol modules (catalog + registry + framing).
//!
//! - Catalog: one struct per message kind, gathered in the `Message` union.
//! - Registry: maps kinds to stable wire names and encodes envelopes.
//! - Framing: 4-byte big-endian length prefix around each envelope.
//!
//! All decoders are panic-free: malformed input is reported as `HubError`
//! so a hostile peer cannot bring the process down.

pub mod frame;
pub mod messages;
pub mod registry;

pub use frame::{encode_frame, DEFAULT_MAX_FRAME_BYTES, FRAME_HEADER_LEN};
pub use messages::*;
pub use registry::Registry;
