//! Initiator role: consumes service-originated replies and notifications.

use std::sync::Arc;

use async_trait::async_trait;

use hubwire_core::protocol::{Message, TypeInfo};

use super::{ignored, run, Route};
use crate::transport::Conn;

/// Callbacks for the device/gateway side of a connection.
///
/// The trailing methods with default bodies cover replies that older peers
/// never send; override them when the answer matters.
#[async_trait]
pub trait Client: Send + Sync {
    async fn hello(&self, conn: &Arc<Conn>, server_version: u32);

    async fn authentication_failed(&self, conn: &Arc<Conn>, reason: String);
    async fn authentication_succeeded(
        &self,
        conn: &Arc<Conn>,
        device_id: u32,
        rf_addr: u16,
        new_key: String,
    );

    async fn join_request_approved(&self, conn: &Arc<Conn>, uuid: String, device_id: u32, rf_addr: u16);
    async fn join_request_pending(&self, conn: &Arc<Conn>, uuid: String);
    async fn join_request_declined(&self, conn: &Arc<Conn>, uuid: String);

    async fn connect_device_approved(
        &self,
        conn: &Arc<Conn>,
        uuid: String,
        parent_device_id: u32,
        device_id: u32,
    );
    async fn connect_device_declined(&self, conn: &Arc<Conn>, uuid: String, parent_device_id: u32);

    async fn type_info(&self, conn: &Arc<Conn>, info: TypeInfo);

    async fn rf_addr(&self, _conn: &Arc<Conn>, _device_id: u32, _rf_addr: u16) {}
    async fn no_type(&self, _conn: &Arc<Conn>, _type_id: u32) {}
    async fn time(&self, _conn: &Arc<Conn>, _server_time: u32) {}
    async fn sensor_data_synced(&self, _conn: &Arc<Conn>, _device_id: u32, _timestamp: u32) {}

    async fn on_close(&self);
}

struct ClientRoute<'a, H: ?Sized>(&'a H);

#[async_trait]
impl<'a, H: Client + ?Sized> Route for ClientRoute<'a, H> {
    async fn route(&self, conn: &Arc<Conn>, msg: Message) {
        let h = self.0;
        match msg {
            Message::Hello(m) => {
                conn.set_protocol_version(m.protocol_version);
                h.hello(conn, m.protocol_version).await;
            }
            Message::AuthenticationFailed(m) => h.authentication_failed(conn, m.reason).await,
            Message::AuthenticationSucceeded(m) => {
                h.authentication_succeeded(conn, m.device_id, m.rf_addr, m.new_key)
                    .await
            }
            Message::JoinRequestApproved(m) => {
                h.join_request_approved(conn, m.uuid, m.device_id, m.rf_addr)
                    .await
            }
            Message::JoinRequestPending(m) => h.join_request_pending(conn, m.uuid).await,
            Message::JoinRequestDeclined(m) => h.join_request_declined(conn, m.uuid).await,
            Message::ConnectDeviceApproved(m) => {
                h.connect_device_approved(conn, m.uuid, m.parent_device_id, m.device_id)
                    .await
            }
            Message::ConnectDeviceDeclined(m) => {
                h.connect_device_declined(conn, m.uuid, m.parent_device_id)
                    .await
            }
            Message::Type(info) => h.type_info(conn, info).await,
            Message::RfAddr(m) => h.rf_addr(conn, m.device_id, m.rf_addr).await,
            Message::NoType(m) => h.no_type(conn, m.type_id).await,
            Message::Time(m) => h.time(conn, m.server_time).await,
            Message::SensorDataSynced(m) => {
                h.sensor_data_synced(conn, m.device_id, m.timestamp).await
            }
            other @ (Message::Authenticate(_)
            | Message::JoinRequest(_)
            | Message::GetRfAddr(_)
            | Message::ConnectDevice(_)
            | Message::MoveDevice(_)
            | Message::DisconnectDevice(_)
            | Message::GetType(_)
            | Message::SensorData(_)
            | Message::GetTime(_)) => ignored(other.kind()),
        }
    }

    async fn closed(&self) {
        self.0.on_close().await;
    }
}

/// Consume messages on `conn` until the peer goes away, then notify `handler`
/// and close.
pub async fn serve_client<H: Client + ?Sized>(conn: Arc<Conn>, handler: &H) {
    run("client", conn, ClientRoute(handler)).await
}
