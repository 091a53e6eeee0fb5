//! Full responder role: handshake, topology, types, telemetry, time.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::{Message, MessageKind, SensorData};

use super::outcome::{AuthGrant, JoinDecision, TypeDefinition};
use super::{ignored, replies, run, Route};
use crate::transport::Conn;

/// Business logic behind the service side of a connection.
///
/// Return `HubError::Unauthorized` from any request (other than
/// `authenticate`, which always reports its error) to have the peer told
/// AuthenticationFailed instead of the normal reply.
#[async_trait]
pub trait Server: Send + Sync {
    /// Returns the version to announce back.
    async fn hello(&self, conn: &Arc<Conn>, client_version: u32) -> u32;

    async fn authenticate(
        &self,
        conn: &Arc<Conn>,
        uuid: &str,
        type_id: u32,
        key: &str,
    ) -> Result<AuthGrant>;

    /// `None` means no address is available and no reply is sent.
    async fn get_rf_addr(&self, conn: &Arc<Conn>, device_id: u32) -> Result<Option<u16>>;

    async fn join_request(&self, conn: &Arc<Conn>, uuid: &str, type_id: u32) -> Result<JoinDecision>;

    /// Returns the new device id; `0` declines the attach.
    async fn connect_device(
        &self,
        conn: &Arc<Conn>,
        parent_device_id: u32,
        uuid: &str,
        type_id: u32,
        port: u16,
    ) -> Result<u32>;

    async fn disconnect_device(
        &self,
        conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
    ) -> Result<()>;

    async fn move_device(
        &self,
        conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
        port: u16,
    ) -> Result<()>;

    /// A definition with `ttl == 0` means no such type; nothing is sent.
    async fn get_type(&self, conn: &Arc<Conn>, type_id: u32) -> Result<TypeDefinition>;

    /// Accepted data is acknowledged with SensorDataSynced.
    async fn sensor_data(&self, _conn: &Arc<Conn>, _data: SensorData) -> Result<()> {
        Err(HubError::Unsupported("sensor data".into()))
    }

    async fn time(&self, _conn: &Arc<Conn>, _client_time: u32) -> u32 {
        unix_time()
    }

    async fn on_close(&self);
}

fn unix_time() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    u32::try_from(secs).unwrap_or(u32::MAX)
}

struct ServerRoute<'a, H: ?Sized>(&'a H);

#[async_trait]
impl<'a, H: Server + ?Sized> Route for ServerRoute<'a, H> {
    async fn route(&self, conn: &Arc<Conn>, msg: Message) {
        let h = self.0;
        match msg {
            Message::Hello(m) => {
                let version = h.hello(conn, m.protocol_version).await;
                replies::hello(conn, version).await;
            }
            Message::Authenticate(m) => {
                let outcome = h.authenticate(conn, &m.uuid, m.type_id, &m.key).await;
                replies::authenticate(conn, outcome).await;
            }
            Message::GetRfAddr(m) => {
                let outcome = h.get_rf_addr(conn, m.device_id).await;
                replies::rf_addr(conn, m.device_id, outcome).await;
            }
            Message::JoinRequest(m) => {
                let outcome = h.join_request(conn, &m.uuid, m.type_id).await;
                replies::join(conn, &m.uuid, outcome).await;
            }
            Message::ConnectDevice(m) => {
                let outcome = h
                    .connect_device(conn, m.parent_device_id, &m.uuid, m.type_id, m.port)
                    .await;
                replies::connect_device(conn, &m.uuid, m.parent_device_id, outcome).await;
            }
            Message::MoveDevice(m) => {
                let outcome = h
                    .move_device(conn, m.parent_device_id, m.device_id, m.port)
                    .await;
                replies::topology(conn, MessageKind::MoveDevice, outcome).await;
            }
            Message::DisconnectDevice(m) => {
                let outcome = h
                    .disconnect_device(conn, m.parent_device_id, m.device_id)
                    .await;
                replies::topology(conn, MessageKind::DisconnectDevice, outcome).await;
            }
            Message::GetType(m) => {
                let outcome = h.get_type(conn, m.type_id).await;
                replies::type_info(conn, m.type_id, outcome).await;
            }
            Message::SensorData(m) => {
                let (device_id, timestamp) = (m.device_id, m.timestamp);
                let outcome = h.sensor_data(conn, m).await;
                replies::sensor_data(conn, device_id, timestamp, outcome).await;
            }
            Message::GetTime(m) => {
                let server_time = h.time(conn, m.client_time).await;
                replies::time(conn, server_time).await;
            }
            other @ (Message::AuthenticationFailed(_)
            | Message::AuthenticationSucceeded(_)
            | Message::JoinRequestApproved(_)
            | Message::JoinRequestPending(_)
            | Message::JoinRequestDeclined(_)
            | Message::RfAddr(_)
            | Message::ConnectDeviceApproved(_)
            | Message::ConnectDeviceDeclined(_)
            | Message::Type(_)
            | Message::NoType(_)
            | Message::SensorDataSynced(_)
            | Message::Time(_)) => ignored(other.kind()),
        }
    }

    async fn closed(&self) {
        self.0.on_close().await;
    }
}

/// Serve `conn` until the peer goes away, then notify `handler` and close.
pub async fn serve_server<H: Server + ?Sized>(conn: Arc<Conn>, handler: &H) {
    run("server", conn, ServerRoute(handler)).await
}
