//! Reply rules shared by the responder roles (`Server`, `RequestHandler`).
//!
//! Each function takes the handler's outcome and writes zero or one message.
//! Write failures are logged and never escalate to the loop.

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::MessageKind;

use super::outcome::{AuthGrant, JoinDecision, TypeDefinition};
use crate::transport::Conn;

fn sent(reply: MessageKind, res: Result<()>) {
    if let Err(e) = res {
        tracing::warn!(?reply, error = %e, "reply write failed");
    }
}

/// `Unauthorized` becomes one AuthenticationFailed; anything else is logged.
async fn refused(conn: &Conn, request: MessageKind, err: HubError) {
    if err.is_unauthorized() {
        tracing::debug!(?request, "request refused: not authenticated");
        sent(
            MessageKind::AuthenticationFailed,
            conn.authentication_failed(&err.to_string()).await,
        );
    } else {
        tracing::warn!(?request, error = %err, code = err.kind().as_str(), "handler failed");
    }
}

pub(crate) async fn hello(conn: &Conn, version: u32) {
    conn.set_protocol_version(version);
    sent(MessageKind::Hello, conn.hello(version).await);
}

/// Any authentication error is reported to the peer with its text.
pub(crate) async fn authenticate(conn: &Conn, outcome: Result<AuthGrant>) {
    match outcome {
        Ok(grant) => sent(
            MessageKind::AuthenticationSucceeded,
            conn.authentication_succeeded(grant.device_id, grant.rf_addr, &grant.new_key)
                .await,
        ),
        Err(e) => {
            tracing::debug!(error = %e, "authentication rejected");
            sent(
                MessageKind::AuthenticationFailed,
                conn.authentication_failed(&e.to_string()).await,
            );
        }
    }
}

pub(crate) async fn rf_addr(conn: &Conn, device_id: u32, outcome: Result<Option<u16>>) {
    match outcome {
        Ok(Some(addr)) => sent(MessageKind::RfAddr, conn.rf_addr(device_id, addr).await),
        Ok(None) => tracing::debug!(device_id, "no rf address available"),
        Err(e) => refused(conn, MessageKind::GetRfAddr, e).await,
    }
}

pub(crate) async fn join(conn: &Conn, uuid: &str, outcome: Result<JoinDecision>) {
    let (reply, res) = match outcome {
        Ok(JoinDecision::Approved { device_id, rf_addr }) => (
            MessageKind::JoinRequestApproved,
            conn.join_request_approved(uuid, device_id, rf_addr).await,
        ),
        Ok(JoinDecision::Pending) => (
            MessageKind::JoinRequestPending,
            conn.join_request_pending(uuid).await,
        ),
        Ok(JoinDecision::Declined) => (
            MessageKind::JoinRequestDeclined,
            conn.join_request_declined(uuid).await,
        ),
        Err(e) => return refused(conn, MessageKind::JoinRequest, e).await,
    };
    sent(reply, res);
}

pub(crate) async fn connect_device(
    conn: &Conn,
    uuid: &str,
    parent_device_id: u32,
    outcome: Result<u32>,
) {
    match outcome {
        Ok(0) => sent(
            MessageKind::ConnectDeviceDeclined,
            conn.connect_device_declined(uuid, parent_device_id).await,
        ),
        Ok(device_id) => sent(
            MessageKind::ConnectDeviceApproved,
            conn.connect_device_approved(uuid, parent_device_id, device_id)
                .await,
        ),
        Err(e) => refused(conn, MessageKind::ConnectDevice, e).await,
    }
}

/// Topology changes are acknowledged by silence.
pub(crate) async fn topology(conn: &Conn, request: MessageKind, outcome: Result<()>) {
    if let Err(e) = outcome {
        refused(conn, request, e).await;
    }
}

pub(crate) async fn type_info(conn: &Conn, type_id: u32, outcome: Result<TypeDefinition>) {
    match outcome {
        Ok(def) if !def.is_known() => tracing::debug!(type_id, "type unknown; no reply"),
        Ok(def) => sent(MessageKind::Type, conn.send_type(def.into_info(type_id)).await),
        Err(e) => refused(conn, MessageKind::GetType, e).await,
    }
}

pub(crate) async fn sensor_data(conn: &Conn, device_id: u32, timestamp: u32, outcome: Result<()>) {
    match outcome {
        Ok(()) => sent(
            MessageKind::SensorDataSynced,
            conn.sensor_data_synced(device_id, timestamp).await,
        ),
        Err(e) => refused(conn, MessageKind::SensorData, e).await,
    }
}

pub(crate) async fn time(conn: &Conn, server_time: u32) {
    sent(MessageKind::Time, conn.time(server_time).await);
}
