//! Length-prefixed framing.
//!
//! A frame is `len: u32 (big-endian)` followed by `len` payload bytes. The
//! payload is one envelope produced by [`Registry::encode`](super::Registry::encode).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{HubError, Result};

/// Size of the length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for a single frame payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(payload.len()).map_err(|_| HubError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}
