//! Shared pipes and recording handlers for dispatch tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::{Message, Registry, TypeInfo, DEFAULT_MAX_FRAME_BYTES};
use hubwire_service::dispatch::{
    AuthGrant, Client, JoinDecision, RequestHandler, Server, TypeDefinition,
};
use hubwire_service::transport::Conn;

const WAIT: Duration = Duration::from_secs(2);

pub fn registry() -> Arc<Registry> {
    Arc::new(Registry::standard())
}

/// Two connected ends over an in-memory pipe: `(service, peer)`.
pub fn conn_pair() -> (Arc<Conn>, Arc<Conn>) {
    let reg = registry();
    let (a, b) = tokio::io::duplex(8 * 1024);
    (
        Arc::new(Conn::new(a, Arc::clone(&reg), DEFAULT_MAX_FRAME_BYTES)),
        Arc::new(Conn::new(b, reg, DEFAULT_MAX_FRAME_BYTES)),
    )
}

/// A `Conn` on one end and raw bytes on the other, for hand-made frames.
pub fn raw_pair(max_frame_bytes: usize) -> (Arc<Conn>, RawPeer) {
    let reg = registry();
    let (a, b) = tokio::io::duplex(8 * 1024);
    (
        Arc::new(Conn::new(a, Arc::clone(&reg), max_frame_bytes)),
        RawPeer {
            stream: b,
            registry: reg,
        },
    )
}

pub struct RawPeer {
    pub stream: DuplexStream,
    registry: Arc<Registry>,
}

impl RawPeer {
    pub async fn send(&mut self, msg: impl Into<Message>) {
        let frame = self.registry.encode_frame(&msg.into()).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }

    /// One well-formed frame around arbitrary payload bytes.
    pub async fn send_payload(&mut self, payload: &[u8]) {
        self.send_header(payload.len() as u32).await;
        self.stream.write_all(payload).await.unwrap();
    }

    pub async fn send_header(&mut self, len: u32) {
        self.stream.write_all(&len.to_be_bytes()).await.unwrap();
    }

    pub async fn recv(&mut self) -> Message {
        tokio::time::timeout(WAIT, async {
            let len = self.stream.read_u32().await.unwrap() as usize;
            let mut payload = vec![0u8; len];
            self.stream.read_exact(&mut payload).await.unwrap();
            self.registry.decode(&payload).unwrap()
        })
        .await
        .expect("timed out waiting for a frame")
    }
}

/// Next message on `conn`, failing the test after a short wait.
pub async fn next(conn: &Conn) -> Message {
    tokio::time::timeout(WAIT, conn.read())
        .await
        .expect("timed out waiting for a message")
        .expect("read failed")
}

#[derive(Default)]
struct Record {
    calls: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl Record {
    fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn closed(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Configurable `Server` that records every call.
pub struct StubServer {
    pub version: u32,
    pub reject_auth: Option<String>,
    pub require_auth: bool,
    pub rf_addr: Option<u16>,
    pub join: JoinDecision,
    pub connect_id: u32,
    pub type_def: TypeDefinition,
    /// Non-auth handler failure from every request except hello/authenticate.
    pub fail_requests: bool,
    pub(crate) record: Record,
}

impl Default for StubServer {
    fn default() -> Self {
        Self {
            version: 9,
            reject_auth: None,
            require_auth: false,
            rf_addr: None,
            join: JoinDecision::Pending,
            connect_id: 0,
            type_def: TypeDefinition::unknown(),
            fail_requests: false,
            record: Record::default(),
        }
    }
}

impl StubServer {
    pub fn calls(&self) -> Vec<String> {
        self.record.calls()
    }

    pub fn close_count(&self) -> usize {
        self.record.close_count()
    }

    fn gate(&self) -> Result<()> {
        if self.require_auth {
            return Err(HubError::Unauthorized);
        }
        if self.fail_requests {
            return Err(HubError::Handler("backend unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Server for StubServer {
    async fn hello(&self, _conn: &Arc<Conn>, client_version: u32) -> u32 {
        self.record.push(format!("hello {client_version}"));
        self.version
    }

    async fn authenticate(
        &self,
        _conn: &Arc<Conn>,
        uuid: &str,
        type_id: u32,
        key: &str,
    ) -> Result<AuthGrant> {
        self.record.push(format!("authenticate {uuid} {type_id} {key}"));
        if let Some(reason) = &self.reject_auth {
            return Err(HubError::Handler(reason.clone()));
        }
        Ok(AuthGrant {
            device_id: 1,
            rf_addr: 10,
            new_key: format!("{key}-next"),
        })
    }

    async fn get_rf_addr(&self, _conn: &Arc<Conn>, device_id: u32) -> Result<Option<u16>> {
        self.record.push(format!("get_rf_addr {device_id}"));
        self.gate()?;
        Ok(self.rf_addr)
    }

    async fn join_request(&self, _conn: &Arc<Conn>, uuid: &str, type_id: u32) -> Result<JoinDecision> {
        self.record.push(format!("join_request {uuid} {type_id}"));
        self.gate()?;
        Ok(self.join)
    }

    async fn connect_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        uuid: &str,
        type_id: u32,
        port: u16,
    ) -> Result<u32> {
        self.record
            .push(format!("connect_device {parent_device_id} {uuid} {type_id} {port}"));
        self.gate()?;
        Ok(self.connect_id)
    }

    async fn disconnect_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
    ) -> Result<()> {
        self.record
            .push(format!("disconnect_device {parent_device_id} {device_id}"));
        self.gate()?;
        Ok(())
    }

    async fn move_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
        port: u16,
    ) -> Result<()> {
        self.record
            .push(format!("move_device {parent_device_id} {device_id} {port}"));
        self.gate()?;
        Ok(())
    }

    async fn get_type(&self, _conn: &Arc<Conn>, type_id: u32) -> Result<TypeDefinition> {
        self.record.push(format!("get_type {type_id}"));
        self.gate()?;
        Ok(self.type_def.clone())
    }

    async fn on_close(&self) {
        self.record.closed();
    }
}

/// Handshake-only handler that records every call.
#[derive(Default)]
pub struct StubRequests {
    pub rf_addr: Option<u16>,
    pub join: Option<JoinDecision>,
    pub(crate) record: Record,
}

impl StubRequests {
    pub fn calls(&self) -> Vec<String> {
        self.record.calls()
    }

    pub fn close_count(&self) -> usize {
        self.record.close_count()
    }
}

#[async_trait]
impl RequestHandler for StubRequests {
    async fn hello(&self, _conn: &Arc<Conn>, client_version: u32) -> u32 {
        self.record.push(format!("hello {client_version}"));
        client_version
    }

    async fn authenticate(
        &self,
        _conn: &Arc<Conn>,
        uuid: &str,
        _type_id: u32,
        key: &str,
    ) -> Result<AuthGrant> {
        self.record.push(format!("authenticate {uuid}"));
        if key.is_empty() {
            return Err(HubError::Unauthorized);
        }
        Ok(AuthGrant {
            device_id: 2,
            rf_addr: 20,
            new_key: "rotated".into(),
        })
    }

    async fn get_rf_addr(&self, _conn: &Arc<Conn>, device_id: u32) -> Result<Option<u16>> {
        self.record.push(format!("get_rf_addr {device_id}"));
        Ok(self.rf_addr)
    }

    async fn join_request(&self, _conn: &Arc<Conn>, uuid: &str, _type_id: u32) -> Result<JoinDecision> {
        self.record.push(format!("join_request {uuid}"));
        self.join.ok_or(HubError::Unauthorized)
    }

    async fn on_close(&self) {
        self.record.closed();
    }
}

/// `Client` that records every callback, overriding none of the defaults.
#[derive(Default)]
pub struct StubClient {
    pub(crate) record: Record,
}

impl StubClient {
    pub fn calls(&self) -> Vec<String> {
        self.record.calls()
    }

    pub fn close_count(&self) -> usize {
        self.record.close_count()
    }
}

#[async_trait]
impl Client for StubClient {
    async fn hello(&self, _conn: &Arc<Conn>, server_version: u32) {
        self.record.push(format!("hello {server_version}"));
    }

    async fn authentication_failed(&self, _conn: &Arc<Conn>, reason: String) {
        self.record.push(format!("authentication_failed {reason}"));
    }

    async fn authentication_succeeded(
        &self,
        _conn: &Arc<Conn>,
        device_id: u32,
        rf_addr: u16,
        new_key: String,
    ) {
        self.record
            .push(format!("authentication_succeeded {device_id} {rf_addr} {new_key}"));
    }

    async fn join_request_approved(&self, _conn: &Arc<Conn>, uuid: String, device_id: u32, rf_addr: u16) {
        self.record
            .push(format!("join_request_approved {uuid} {device_id} {rf_addr}"));
    }

    async fn join_request_pending(&self, _conn: &Arc<Conn>, uuid: String) {
        self.record.push(format!("join_request_pending {uuid}"));
    }

    async fn join_request_declined(&self, _conn: &Arc<Conn>, uuid: String) {
        self.record.push(format!("join_request_declined {uuid}"));
    }

    async fn connect_device_approved(
        &self,
        _conn: &Arc<Conn>,
        uuid: String,
        parent_device_id: u32,
        device_id: u32,
    ) {
        self.record.push(format!(
            "connect_device_approved {uuid} {parent_device_id} {device_id}"
        ));
    }

    async fn connect_device_declined(&self, _conn: &Arc<Conn>, uuid: String, parent_device_id: u32) {
        self.record
            .push(format!("connect_device_declined {uuid} {parent_device_id}"));
    }

    async fn type_info(&self, _conn: &Arc<Conn>, info: TypeInfo) {
        self.record.push(format!("type_info {} {}", info.type_id, info.ttl));
    }

    async fn on_close(&self) {
        self.record.closed();
    }
}
