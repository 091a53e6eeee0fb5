//! Development handler end to end, over a pipe and over TCP.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use hubwire_core::protocol::*;
use hubwire_service::app_state::AppState;
use hubwire_service::config;
use hubwire_service::dispatch::{serve_server, TypeDefinition};
use hubwire_service::services::{DevRegistry, DevServer};
use hubwire_service::transport::{tcp, Conn};

use support::{conn_pair, next};

fn spawn_dev(devices: &Arc<DevRegistry>) -> Arc<Conn> {
    let (service, peer) = conn_pair();
    let handler = DevServer::new(Arc::clone(devices));
    tokio::spawn(async move { serve_server(service, &handler).await });
    peer
}

async fn authenticate(peer: &Conn, uuid: &str) -> AuthenticationSucceeded {
    peer.authenticate(1, uuid, "k1").await.unwrap();
    match next(peer).await {
        Message::AuthenticationSucceeded(m) => m,
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn requests_before_authentication_are_refused() {
    let devices = Arc::new(DevRegistry::new(false));
    let peer = spawn_dev(&devices);

    peer.get_type(5).await.unwrap();
    assert!(matches!(next(&peer).await, Message::AuthenticationFailed(_)));

    peer.authenticate(1, "gw-1", "").await.unwrap();
    assert!(matches!(next(&peer).await, Message::AuthenticationFailed(_)));
    assert_eq!(devices.device_count(), 0);
}

#[tokio::test]
async fn gateway_session() {
    let devices = Arc::new(DevRegistry::new(false));
    devices.define_type(
        5,
        TypeDefinition {
            ttl: 300,
            ..TypeDefinition::default()
        },
    );
    let peer = spawn_dev(&devices);

    peer.hello(1).await.unwrap();
    assert_eq!(
        next(&peer).await,
        Message::Hello(Hello {
            protocol_version: PROTOCOL_VERSION
        })
    );

    let me = authenticate(&peer, "gw-1").await;
    assert_ne!(me.device_id, 0);
    assert!(!me.new_key.is_empty());

    peer.get_rf_addr(me.device_id).await.unwrap();
    assert_eq!(
        next(&peer).await,
        Message::RfAddr(RfAddr {
            device_id: me.device_id,
            rf_addr: me.rf_addr
        })
    );

    peer.request_join("wl-1", 5).await.unwrap();
    assert_eq!(
        next(&peer).await,
        Message::JoinRequestPending(JoinRequestPending { uuid: "wl-1".into() })
    );

    peer.connect_device("w-1", 5, 2, me.device_id).await.unwrap();
    let child = match next(&peer).await {
        Message::ConnectDeviceApproved(m) => {
            assert_eq!(m.parent_device_id, me.device_id);
            m.device_id
        }
        other => panic!("unexpected reply: {other:?}"),
    };
    assert_eq!(devices.device(child).unwrap().parent, Some((me.device_id, 2)));

    peer.connect_device("w-2", 5, 3, 9999).await.unwrap();
    assert!(matches!(
        next(&peer).await,
        Message::ConnectDeviceDeclined(_)
    ));

    peer.move_device(child, me.device_id, 4).await.unwrap();
    peer.get_type(5).await.unwrap();
    match next(&peer).await {
        Message::Type(t) => assert_eq!((t.type_id, t.ttl), (5, 300)),
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(devices.device(child).unwrap().parent, Some((me.device_id, 4)));

    let mut values = BTreeMap::new();
    values.insert("temp".to_string(), 21.5_f32);
    peer.sensor_data(SensorData {
        device_id: child,
        timestamp: 100,
        values,
        raw: None,
    })
    .await
    .unwrap();
    assert_eq!(
        next(&peer).await,
        Message::SensorDataSynced(SensorDataSynced {
            device_id: child,
            timestamp: 100
        })
    );
    assert_eq!(devices.samples_received(), 1);
}

#[tokio::test]
async fn auto_approved_join_is_stable() {
    let devices = Arc::new(DevRegistry::new(true));
    let peer = spawn_dev(&devices);
    authenticate(&peer, "gw-1").await;

    peer.request_join("wl-1", 5).await.unwrap();
    let first = next(&peer).await;
    peer.request_join("wl-1", 5).await.unwrap();
    assert_eq!(next(&peer).await, first);
    assert!(matches!(first, Message::JoinRequestApproved(_)));
}

#[tokio::test]
async fn tcp_accept_loop_serves_connections() {
    let cfg = config::load_from_str("version: 1\nwire:\n  protocol_version: 3\n").unwrap();
    let state = AppState::new(cfg).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(tcp::accept_loop(listener, state.clone(), |s| {
        DevServer::with_protocol_version(s.devices(), s.protocol_version())
    }));

    for uuid in ["gw-a", "gw-b"] {
        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let peer = Conn::from_tcp(stream, state.registry(), state.max_frame_bytes());
        assert_eq!(peer.peer_addr(), Some(addr));

        peer.hello(1).await.unwrap();
        assert_eq!(next(&peer).await, Message::Hello(Hello { protocol_version: 3 }));
        authenticate(&peer, uuid).await;
        peer.close().await;
    }

    assert_eq!(state.devices().device_count(), 2);
}
