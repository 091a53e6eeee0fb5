//! Codec registry: kind <-> stable name, plus envelope encode/decode.
//!
//! Wire compatibility hangs on the registered names, not on Rust type names,
//! so internal refactors never change what goes over the wire. A registry is
//! built once at startup and shared by every connection; there is no
//! process-wide registration state.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};
use crate::protocol::frame::encode_frame;
use crate::protocol::messages::{Message, MessageKind};

/// Envelope as it appears on the wire (MessagePack map).
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    kind: String,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
}

/// Registered message kinds.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    names: HashMap<MessageKind, String>,
    kinds: HashMap<String, MessageKind>,
}

impl Registry {
    /// Empty registry; every kind must be registered before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every catalog kind under its standard name.
    pub fn standard() -> Self {
        let mut reg = Self::new();
        for &kind in MessageKind::ALL {
            reg.names.insert(kind, kind.standard_name().to_string());
            reg.kinds.insert(kind.standard_name().to_string(), kind);
        }
        reg
    }

    /// Register `kind` under `name`. Names and kinds are both unique.
    pub fn register(&mut self, kind: MessageKind, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(HubError::Config(format!("empty name for {kind:?}")));
        }
        if self.kinds.contains_key(&name) {
            return Err(HubError::DuplicateRegistration(name));
        }
        if let Some(existing) = self.names.get(&kind) {
            return Err(HubError::DuplicateRegistration(format!(
                "{kind:?} already registered as {existing}"
            )));
        }
        self.names.insert(kind, name.clone());
        self.kinds.insert(name, kind);
        Ok(())
    }

    pub fn name_of(&self, kind: MessageKind) -> Option<&str> {
        self.names.get(&kind).map(String::as_str)
    }

    pub fn kind_of(&self, name: &str) -> Option<MessageKind> {
        self.kinds.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Encode one envelope (frame payload, no length prefix).
    pub fn encode(&self, msg: &Message) -> Result<Bytes> {
        let kind = msg.kind();
        let name = self
            .name_of(kind)
            .ok_or_else(|| HubError::UnregisteredKind(format!("{kind:?}")))?;

        let body = msg
            .encode_body()
            .map_err(|e| HubError::Encode(format!("{name} body: {e}")))?;

        let env = WireEnvelope {
            kind: name.to_string(),
            body,
        };
        let bytes = rmp_serde::to_vec_named(&env)
            .map_err(|e| HubError::Encode(format!("{name} envelope: {e}")))?;
        Ok(Bytes::from(bytes))
    }

    /// Encode one envelope including the length prefix.
    pub fn encode_frame(&self, msg: &Message) -> Result<Bytes> {
        let payload = self.encode(msg)?;
        encode_frame(&payload)
    }

    /// Decode one envelope (frame payload, no length prefix).
    pub fn decode(&self, payload: &[u8]) -> Result<Message> {
        let env: WireEnvelope = rmp_serde::from_slice(payload)
            .map_err(|e| HubError::Decode(format!("invalid envelope: {e}")))?;

        let kind = self
            .kind_of(&env.kind)
            .ok_or_else(|| HubError::UnregisteredKind(env.kind.clone()))?;

        Message::decode_body(kind, &env.body)
            .map_err(|e| HubError::Decode(format!("invalid {} body: {e}", env.kind)))
    }
}
