//! Framed connection over one byte stream.
//!
//! Concurrency contract:
//! - Reads are sequential: `read` holds the read lock for a whole frame, so at
//!   most one decode is in flight.
//! - Writes are atomic: a frame is fully encoded before the write lock is
//!   taken, then written and flushed under the lock. Frames never interleave,
//!   but no order is imposed across concurrent writers.
//! - A frame that stops partway (write future dropped, I/O error, or a
//!   concurrent `close`) takes the connection down with it: the write half is
//!   dropped and the connection is marked closed, so no later frame can land
//!   behind a partial one.
//! - `close` wakes an in-flight `read` (which then reports `EndOfStream`) and
//!   any blocked `write` (which reports `Closed`), then releases both halves.
//!   It is idempotent.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::{
    encode_frame, Authenticate, AuthenticationFailed, AuthenticationSucceeded, ConnectDevice,
    ConnectDeviceApproved, ConnectDeviceDeclined, DisconnectDevice, GetRfAddr, GetTime, GetType,
    Hello, JoinRequest, JoinRequestApproved, JoinRequestDeclined, JoinRequestPending, Message,
    MoveDevice, NoType, Registry, RfAddr, SensorData, SensorDataSynced, Time, TypeInfo,
};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One peer connection. Share it as `Arc<Conn>`.
pub struct Conn {
    reader: Mutex<Option<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    registry: Arc<Registry>,
    max_frame_bytes: usize,
    peer: Option<SocketAddr>,
    closed: watch::Sender<bool>,
    protocol_version: AtomicU32,
}

impl Conn {
    /// Wrap any duplex byte stream.
    pub fn new<S>(stream: S, registry: Arc<Registry>, max_frame_bytes: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (r, w) = tokio::io::split(stream);
        Self::from_parts(Box::new(r), Box::new(w), registry, max_frame_bytes, None)
    }

    /// Wrap an accepted or connected TCP stream and remember the peer address.
    pub fn from_tcp(stream: TcpStream, registry: Arc<Registry>, max_frame_bytes: usize) -> Self {
        let peer = stream.peer_addr().ok();
        let (r, w) = stream.into_split();
        Self::from_parts(Box::new(r), Box::new(w), registry, max_frame_bytes, peer)
    }

    fn from_parts(
        reader: BoxedReader,
        writer: BoxedWriter,
        registry: Arc<Registry>,
        max_frame_bytes: usize,
        peer: Option<SocketAddr>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            registry,
            max_frame_bytes,
            peer,
            closed,
            protocol_version: AtomicU32::new(0),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Version agreed in the Hello exchange, if one happened.
    pub fn protocol_version(&self) -> Option<u32> {
        match self.protocol_version.load(Ordering::Acquire) {
            0 => None,
            v => Some(v),
        }
    }

    pub fn set_protocol_version(&self, version: u32) {
        self.protocol_version.store(version, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Read exactly one message.
    ///
    /// Returns `EndOfStream` when the peer closes the stream (also mid-frame)
    /// or when `close` is called concurrently. Malformed payloads and oversize
    /// frames are consumed whole and reported without desynchronizing the
    /// stream, so the caller may keep reading.
    ///
    /// Dropping a pending `read` mid-frame loses the frame boundary; stop a
    /// reader with `close` instead.
    pub async fn read(&self) -> Result<Message> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(HubError::EndOfStream);
        }

        let mut guard = tokio::select! {
            biased;
            _ = closed.changed() => return Err(HubError::EndOfStream),
            guard = self.reader.lock() => guard,
        };
        let reader = guard.as_mut().ok_or(HubError::EndOfStream)?;

        tokio::select! {
            biased;
            _ = closed.changed() => Err(HubError::EndOfStream),
            res = read_frame(&mut **reader, self.max_frame_bytes) => {
                let payload = res?;
                self.registry.decode(&payload)
            }
        }
    }

    /// Encode and send one message as a single uninterrupted frame.
    ///
    /// Returns `Closed` once the connection is closed, including when `close`
    /// runs while this write is blocked on a slow peer.
    pub async fn write(&self, msg: impl Into<Message>) -> Result<()> {
        let msg = msg.into();
        let payload = self.registry.encode(&msg)?;
        if payload.len() > self.max_frame_bytes {
            return Err(HubError::FrameTooLarge {
                len: payload.len(),
                max: self.max_frame_bytes,
            });
        }
        let frame = encode_frame(&payload)?;

        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(HubError::Closed);
        }

        let mut slot = tokio::select! {
            biased;
            _ = closed.changed() => return Err(HubError::Closed),
            slot = self.writer.lock() => slot,
        };
        let mut writer = slot.take().ok_or(HubError::Closed)?;

        // From here the frame either completes or the write half is gone.
        let in_flight = FrameInFlight {
            closed: &self.closed,
        };
        let res = tokio::select! {
            biased;
            _ = closed.changed() => Err(HubError::Closed),
            res = write_frame(&mut writer, &frame) => res,
        };
        match res {
            Ok(()) => {
                in_flight.finish();
                *slot = Some(writer);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "frame write abandoned; connection closed");
                Err(e)
            }
        }
    }

    /// Release the stream. Later calls do nothing.
    pub async fn close(&self) {
        if !self.closed.send_replace(true) {
            tracing::debug!(peer = ?self.peer, "closing connection");
        }

        // Blocked readers and writers observe the flag and let go of the locks.
        let writer = self.writer.lock().await.take();
        if let Some(mut w) = writer {
            if let Err(e) = w.shutdown().await {
                tracing::debug!(error = %e, "write half shutdown failed");
            }
        }
        drop(self.reader.lock().await.take());
    }

    // --------------------
    // Handshake
    // --------------------

    pub async fn hello(&self, protocol_version: u32) -> Result<()> {
        self.write(Hello { protocol_version }).await
    }

    pub async fn authenticate(&self, type_id: u32, uuid: &str, key: &str) -> Result<()> {
        self.write(Authenticate {
            type_id,
            uuid: uuid.to_string(),
            key: key.to_string(),
        })
        .await
    }

    pub async fn authentication_failed(&self, reason: &str) -> Result<()> {
        self.write(AuthenticationFailed {
            reason: reason.to_string(),
        })
        .await
    }

    pub async fn authentication_succeeded(
        &self,
        device_id: u32,
        rf_addr: u16,
        new_key: &str,
    ) -> Result<()> {
        self.write(AuthenticationSucceeded {
            device_id,
            rf_addr,
            new_key: new_key.to_string(),
        })
        .await
    }

    // --------------------
    // RF addressing
    // --------------------

    pub async fn get_rf_addr(&self, device_id: u32) -> Result<()> {
        self.write(GetRfAddr { device_id }).await
    }

    pub async fn rf_addr(&self, device_id: u32, rf_addr: u16) -> Result<()> {
        self.write(RfAddr { device_id, rf_addr }).await
    }

    // --------------------
    // Types
    // --------------------

    pub async fn get_type(&self, type_id: u32) -> Result<()> {
        self.write(GetType { type_id }).await
    }

    pub async fn no_type(&self, type_id: u32) -> Result<()> {
        self.write(NoType { type_id }).await
    }

    pub async fn send_type(&self, info: TypeInfo) -> Result<()> {
        self.write(info).await
    }

    // --------------------
    // Joining
    // --------------------

    pub async fn request_join(&self, uuid: &str, type_id: u32) -> Result<()> {
        self.write(JoinRequest {
            uuid: uuid.to_string(),
            type_id,
        })
        .await
    }

    pub async fn join_request_pending(&self, uuid: &str) -> Result<()> {
        self.write(JoinRequestPending {
            uuid: uuid.to_string(),
        })
        .await
    }

    pub async fn join_request_declined(&self, uuid: &str) -> Result<()> {
        self.write(JoinRequestDeclined {
            uuid: uuid.to_string(),
        })
        .await
    }

    pub async fn join_request_approved(&self, uuid: &str, device_id: u32, rf_addr: u16) -> Result<()> {
        self.write(JoinRequestApproved {
            uuid: uuid.to_string(),
            device_id,
            rf_addr,
        })
        .await
    }

    // --------------------
    // Wired devices
    // --------------------

    pub async fn connect_device(
        &self,
        uuid: &str,
        type_id: u32,
        port: u16,
        parent_device_id: u32,
    ) -> Result<()> {
        self.write(ConnectDevice {
            uuid: uuid.to_string(),
            type_id,
            parent_device_id,
            port,
        })
        .await
    }

    pub async fn connect_device_approved(
        &self,
        uuid: &str,
        parent_device_id: u32,
        device_id: u32,
    ) -> Result<()> {
        self.write(ConnectDeviceApproved {
            uuid: uuid.to_string(),
            parent_device_id,
            device_id,
        })
        .await
    }

    pub async fn connect_device_declined(&self, uuid: &str, parent_device_id: u32) -> Result<()> {
        self.write(ConnectDeviceDeclined {
            uuid: uuid.to_string(),
            parent_device_id,
        })
        .await
    }

    pub async fn move_device(&self, device_id: u32, parent_device_id: u32, port: u16) -> Result<()> {
        self.write(MoveDevice {
            device_id,
            parent_device_id,
            port,
        })
        .await
    }

    pub async fn disconnect_device(&self, device_id: u32, parent_device_id: u32) -> Result<()> {
        self.write(DisconnectDevice {
            device_id,
            parent_device_id,
        })
        .await
    }

    // --------------------
    // Telemetry / time
    // --------------------

    pub async fn sensor_data(&self, data: SensorData) -> Result<()> {
        self.write(data).await
    }

    pub async fn sensor_data_synced(&self, device_id: u32, timestamp: u32) -> Result<()> {
        self.write(SensorDataSynced {
            device_id,
            timestamp,
        })
        .await
    }

    pub async fn get_time(&self, client_time: u32) -> Result<()> {
        self.write(GetTime { client_time }).await
    }

    pub async fn time(&self, server_time: u32) -> Result<()> {
        self.write(Time { server_time }).await
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish_non_exhaustive()
    }
}

/// Marks the connection closed unless the frame it guards completes.
struct FrameInFlight<'a> {
    closed: &'a watch::Sender<bool>,
}

impl FrameInFlight<'_> {
    fn finish(self) {
        std::mem::forget(self);
    }
}

impl Drop for FrameInFlight<'_> {
    fn drop(&mut self) {
        self.closed.send_replace(true);
    }
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// EOF anywhere in a frame means the peer is gone.
fn eof_or_io(e: std::io::Error) -> HubError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        HubError::EndOfStream
    } else {
        HubError::Io(e)
    }
}

async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let len = reader.read_u32().await.map_err(eof_or_io)? as usize;

    if len > max_frame_bytes {
        // Drain so the next read starts on a frame boundary.
        let mut limited = (&mut *reader).take(len as u64);
        let drained = tokio::io::copy(&mut limited, &mut tokio::io::sink())
            .await
            .map_err(eof_or_io)?;
        if drained < len as u64 {
            return Err(HubError::EndOfStream);
        }
        return Err(HubError::FrameTooLarge {
            len,
            max: max_frame_bytes,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(eof_or_io)?;
    Ok(payload)
}
