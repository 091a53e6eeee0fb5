//! Handshake-only responder role.
//!
//! Speaks the same wire protocol as [`Server`](super::Server) but answers only
//! the handshake requests. Everything else is ignored.

use std::sync::Arc;

use async_trait::async_trait;

use hubwire_core::error::Result;
use hubwire_core::protocol::Message;

use super::outcome::{AuthGrant, JoinDecision};
use super::{ignored, replies, run, Route};
use crate::transport::Conn;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn hello(&self, conn: &Arc<Conn>, client_version: u32) -> u32;

    async fn authenticate(
        &self,
        conn: &Arc<Conn>,
        uuid: &str,
        type_id: u32,
        key: &str,
    ) -> Result<AuthGrant>;

    async fn get_rf_addr(&self, conn: &Arc<Conn>, device_id: u32) -> Result<Option<u16>>;

    async fn join_request(&self, conn: &Arc<Conn>, uuid: &str, type_id: u32) -> Result<JoinDecision>;

    async fn on_close(&self);
}

struct RequestRoute<'a, H: ?Sized>(&'a H);

#[async_trait]
impl<'a, H: RequestHandler + ?Sized> Route for RequestRoute<'a, H> {
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
            other @ (Message::AuthenticationFailed(_)
            | Message::AuthenticationSucceeded(_)
            | Message::JoinRequestApproved(_)
            | Message::JoinRequestPending(_)
            | Message::JoinRequestDeclined(_)
            | Message::RfAddr(_)
            | Message::ConnectDevice(_)
            | Message::ConnectDeviceApproved(_)
            | Message::ConnectDeviceDeclined(_)
            | Message::MoveDevice(_)
            | Message::DisconnectDevice(_)
            | Message::GetType(_)
            | Message::Type(_)
            | Message::NoType(_)
            | Message::SensorData(_)
            | Message::SensorDataSynced(_)
            | Message::GetTime(_)
            | Message::Time(_)) => ignored(other.kind()),
        }
    }

    async fn closed(&self) {
        self.0.on_close().await;
    }
}

/// Answer handshake requests on `conn` until the peer goes away.
pub async fn serve_requests<H: RequestHandler + ?Sized>(conn: Arc<Conn>, handler: &H) {
    run("requests", conn, RequestRoute(handler)).await
}
