//! hubwire service binary.
//!
//! Listens for gateway/device connections over TCP and serves each one with
//! the in-memory development handler. Log filtering follows `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

use hubwire_service::services::DevServer;
use hubwire_service::{app_state, config, transport};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "hubwire.yaml".to_string());
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen = cfg
        .service
        .listen_addr()
        .expect("service.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg).expect("failed to build app state");

    tracing::info!(%listen, config = %path, "hubwire-service starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .expect("failed to bind");

    transport::tcp::accept_loop(listener, state, |s| {
        DevServer::with_protocol_version(s.devices(), s.protocol_version())
    })
    .await;
}
