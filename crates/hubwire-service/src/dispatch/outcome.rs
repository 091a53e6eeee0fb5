//! Values handlers return to the responder loops.

use hubwire_core::protocol::{JoinRequestStatus, TypeInfo};

/// Identity accepted by `authenticate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub device_id: u32,
    pub rf_addr: u16,
    /// Key the peer must use from now on.
    pub new_key: String,
}

/// Join decision; only approval carries an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Approved { device_id: u32, rf_addr: u16 },
    Pending,
    Declined,
}

impl JoinDecision {
    pub fn status(&self) -> JoinRequestStatus {
        match self {
            JoinDecision::Approved { .. } => JoinRequestStatus::Approved,
            JoinDecision::Pending => JoinRequestStatus::Pending,
            JoinDecision::Declined => JoinRequestStatus::Declined,
        }
    }

    /// Build from a status plus the ids used on approval.
    pub fn from_status(status: JoinRequestStatus, device_id: u32, rf_addr: u16) -> Self {
        match status {
            JoinRequestStatus::Approved => JoinDecision::Approved { device_id, rf_addr },
            JoinRequestStatus::Pending => JoinDecision::Pending,
            JoinRequestStatus::Declined => JoinDecision::Declined,
        }
    }
}

/// Type definition returned by `get_type`. `ttl == 0` means no such type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDefinition {
    pub ttl: u32,
    pub is_virtual: bool,
    pub src: String,
    pub masks: Vec<u32>,
    pub intervals: Vec<u8>,
}

impl TypeDefinition {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.ttl != 0
    }

    pub fn into_info(self, type_id: u32) -> TypeInfo {
        TypeInfo {
            type_id,
            is_virtual: self.is_virtual,
            ttl: self.ttl,
            src: self.src,
            masks: self.masks,
            intervals: self.intervals,
        }
    }
}
