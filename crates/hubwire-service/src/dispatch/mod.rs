//! Dispatch loops and handler capability traits.
//!
//! Three roles share one loop shape: read a message, match its kind, call
//! exactly one handler method, send at most one reply. The loop stops on a
//! terminal read error, fires the handler's `on_close` once, and closes the
//! connection. Other read errors are logged and reading continues.

mod client;
mod outcome;
mod replies;
mod requests;
mod server;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use hubwire_core::protocol::{Message, MessageKind};

use crate::transport::Conn;

pub use client::{serve_client, Client};
pub use outcome::{AuthGrant, JoinDecision, TypeDefinition};
pub use requests::{serve_requests, RequestHandler};
pub use server::{serve_server, Server};

/// Role-specific routing table driven by [`run`].
#[async_trait]
pub(crate) trait Route: Send + Sync {
    async fn route(&self, conn: &Arc<Conn>, msg: Message);
    async fn closed(&self);
}

pub(crate) async fn run<R: Route>(role: &'static str, conn: Arc<Conn>, route: R) {
    let span = tracing::info_span!("conn", role, peer = ?conn.peer_addr());
    drive(conn, route).instrument(span).await
}

async fn drive<R: Route>(conn: Arc<Conn>, route: R) {
    tracing::debug!("dispatch loop started");

    loop {
        match conn.read().await {
            Ok(msg) => route.route(&conn, msg).await,
            Err(e) if e.is_terminal() => {
                tracing::debug!(error = %e, "dispatch loop stopping");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.kind().as_str(), "read failed");
            }
        }
    }

    route.closed().await;
    conn.close().await;
}

/// A kind this role does not consume.
fn ignored(kind: MessageKind) {
    tracing::debug!(?kind, "message ignored by this role");
}
