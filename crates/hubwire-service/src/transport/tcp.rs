//! TCP accept loop: one dispatch task per connection.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::app_state::AppState;
use crate::dispatch::{serve_server, Server};
use crate::transport::Conn;

/// Accept connections forever, serving each with a fresh handler.
///
/// Accept errors are logged and do not stop the loop.
pub async fn accept_loop<F, H>(listener: TcpListener, state: AppState, make_handler: F)
where
    F: Fn(&AppState) -> H,
    H: Server + 'static,
{
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        tracing::info!(%peer, "connection accepted");
        let conn = Arc::new(Conn::from_tcp(
            stream,
            state.registry(),
            state.max_frame_bytes(),
        ));
        let handler = make_handler(&state);

        tokio::spawn(async move {
            serve_server(conn, &handler).await;
            tracing::info!(%peer, "connection closed");
        });
    }
}
