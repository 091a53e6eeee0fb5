//! Initiator loop: service replies reach the matching callbacks in order.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::sync::Arc;

use hubwire_core::protocol::TypeInfo;
use hubwire_service::dispatch::serve_client;

use support::{conn_pair, StubClient};

#[tokio::test]
async fn replies_reach_callbacks_then_close_fires_once() {
    let stub = Arc::new(StubClient::default());
    let (service, client) = conn_pair();

    let task = {
        let stub = Arc::clone(&stub);
        let client = Arc::clone(&client);
        tokio::spawn(async move { serve_client(client, &*stub).await })
    };

    service.hello(4).await.unwrap();
    service.authentication_succeeded(1, 10, "k2").await.unwrap();
    service.join_request_approved("d1", 7, 42).await.unwrap();
    service.join_request_pending("d2").await.unwrap();
    service.join_request_declined("d3").await.unwrap();
    service.connect_device_approved("w1", 1, 8).await.unwrap();
    service.connect_device_declined("w2", 1).await.unwrap();
    service
        .send_type(TypeInfo {
            type_id: 5,
            is_virtual: false,
            ttl: 300,
            src: String::new(),
            masks: vec![],
            intervals: vec![],
        })
        .await
        .unwrap();
    // Default no-op callbacks and a request the client never consumes.
    service.rf_addr(7, 0).await.unwrap();
    service.no_type(6).await.unwrap();
    service.time(1_700_000_000).await.unwrap();
    service.get_type(6).await.unwrap();
    service.authentication_failed("expired").await.unwrap();
    service.close().await;

    task.await.unwrap();

    assert_eq!(
        stub.calls(),
        vec![
            "hello 4",
            "authentication_succeeded 1 10 k2",
            "join_request_approved d1 7 42",
            "join_request_pending d2",
            "join_request_declined d3",
            "connect_device_approved w1 1 8",
            "connect_device_declined w2 1",
            "type_info 5 300",
            "authentication_failed expired",
        ]
    );
    assert_eq!(stub.close_count(), 1);
    assert_eq!(client.protocol_version(), Some(4));
    assert!(client.is_closed());
}
