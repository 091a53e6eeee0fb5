//! Message catalog.
//!
//! Every message that crosses the wire is one variant of [`Message`]. The
//! catalog table at the bottom of this file is the single place where a kind
//! is declared: it generates the tagged union, the field-less [`MessageKind`],
//! the standard stable names, and the per-kind body codec. Adding a kind means
//! adding one row; every exhaustive `match` over `Message` then points at the
//! code that must learn about it.
//!
//! Field names are the wire field names, so renaming a Rust field is a wire
//! change. Renaming a struct is not: kinds travel under their registered name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current protocol version announced in `Hello`.
pub const PROTOCOL_VERSION: u32 = 1;

// --------------------
// Handshake
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub protocol_version: u32,
}

/// Authentication connects a gateway or device to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticate {
    pub type_id: u32,
    pub uuid: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationFailed {
    pub reason: String,
}

/// `new_key` replaces the key the peer authenticated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationSucceeded {
    pub device_id: u32,
    pub rf_addr: u16,
    pub new_key: String,
}

// --------------------
// Joining (wireless devices)
// --------------------

/// Sent when a wireless device wants to join. Answered by one of
/// `JoinRequestApproved`, `JoinRequestPending` or `JoinRequestDeclined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub uuid: String,
    pub type_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestApproved {
    pub uuid: String,
    pub device_id: u32,
    pub rf_addr: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestPending {
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequestDeclined {
    pub uuid: String,
}

/// Outcome of a join decision. Never persisted by the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JoinRequestStatus {
    Declined = 0,
    Pending = 1,
    Approved = 2,
}

impl JoinRequestStatus {
    /// Convert from a raw status code. Unknown codes fall back to `Pending`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => JoinRequestStatus::Declined,
            2 => JoinRequestStatus::Approved,
            _ => JoinRequestStatus::Pending,
        }
    }
}

// --------------------
// RF addressing
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRfAddr {
    pub device_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfAddr {
    pub device_id: u32,
    pub rf_addr: u16,
}

// --------------------
// Wired topology (parent <-> child)
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectDevice {
    pub uuid: String,
    pub type_id: u32,
    pub parent_device_id: u32,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectDeviceApproved {
    pub uuid: String,
    pub parent_device_id: u32,
    pub device_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectDeviceDeclined {
    pub uuid: String,
    pub parent_device_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDevice {
    pub device_id: u32,
    pub parent_device_id: u32,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectDevice {
    pub device_id: u32,
    pub parent_device_id: u32,
}

// --------------------
// Type definitions
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetType {
    pub type_id: u32,
}

/// Type definition announcement (wire kind `Type`).
///
/// `ttl` is the refresh interval in seconds; receivers re-query after it
/// expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub type_id: u32,
    pub is_virtual: bool,
    pub ttl: u32,
    pub src: String,
    pub masks: Vec<u32>,
    pub intervals: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoType {
    pub type_id: u32,
}

// --------------------
// Sensor data
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSamples {
    pub sensors: u32,
    pub values: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub device_id: u32,
    pub timestamp: u32,
    pub values: BTreeMap<String, f32>,
    #[serde(default)]
    pub raw: Option<RawSamples>,
}

/// Acknowledges one `SensorData` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDataSynced {
    pub device_id: u32,
    pub timestamp: u32,
}

// --------------------
// Time
// --------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTime {
    pub client_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub server_time: u32,
}

// --------------------
// Catalog
// --------------------

macro_rules! catalog {
    ($($kind:ident($ty:ident) => $name:literal,)+) => {
        /// Field-less discriminant of [`Message`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageKind {
            $($kind,)+
        }

        impl MessageKind {
            /// Every kind in catalog order.
            pub const ALL: &'static [MessageKind] = &[$(MessageKind::$kind,)+];

            /// Name used by [`Registry::standard`](super::Registry::standard).
            pub fn standard_name(self) -> &'static str {
                match self {
                    $(MessageKind::$kind => $name,)+
                }
            }
        }

        /// The tagged union carried by every envelope.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($kind($ty),)+
        }

        impl Message {
            pub fn kind(&self) -> MessageKind {
                match self {
                    $(Message::$kind(_) => MessageKind::$kind,)+
                }
            }

            pub(crate) fn encode_body(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
                match self {
                    $(Message::$kind(m) => rmp_serde::to_vec_named(m),)+
                }
            }

            pub(crate) fn decode_body(
                kind: MessageKind,
                body: &[u8],
            ) -> Result<Self, rmp_serde::decode::Error> {
                match kind {
                    $(MessageKind::$kind => rmp_serde::from_slice::<$ty>(body).map(Message::$kind),)+
                }
            }
        }

        $(
            impl From<$ty> for Message {
                fn from(m: $ty) -> Self {
                    Message::$kind(m)
                }
            }
        )+
    };
}

catalog! {
    Hello(Hello) => "hubwire.Hello",
    Authenticate(Authenticate) => "hubwire.Authenticate",
    AuthenticationFailed(AuthenticationFailed) => "hubwire.AuthenticationFailed",
    AuthenticationSucceeded(AuthenticationSucceeded) => "hubwire.AuthenticationSucceeded",
    JoinRequest(JoinRequest) => "hubwire.JoinRequest",
    JoinRequestApproved(JoinRequestApproved) => "hubwire.JoinRequestApproved",
    JoinRequestPending(JoinRequestPending) => "hubwire.JoinRequestPending",
    JoinRequestDeclined(JoinRequestDeclined) => "hubwire.JoinRequestDeclined",
    GetRfAddr(GetRfAddr) => "hubwire.GetRFAddr",
    RfAddr(RfAddr) => "hubwire.RFAddr",
    ConnectDevice(ConnectDevice) => "hubwire.ConnectDevice",
    ConnectDeviceApproved(ConnectDeviceApproved) => "hubwire.ConnectDeviceApproved",
    ConnectDeviceDeclined(ConnectDeviceDeclined) => "hubwire.ConnectDeviceDeclined",
    MoveDevice(MoveDevice) => "hubwire.MoveDevice",
    DisconnectDevice(DisconnectDevice) => "hubwire.DisconnectDevice",
    GetType(GetType) => "hubwire.GetType",
    Type(TypeInfo) => "hubwire.Type",
    NoType(NoType) => "hubwire.NoType",
    SensorData(SensorData) => "hubwire.SensorData",
    SensorDataSynced(SensorDataSynced) => "hubwire.SensorDataSynced",
    GetTime(GetTime) => "hubwire.GetTime",
    Time(Time) => "hubwire.Time",
}
