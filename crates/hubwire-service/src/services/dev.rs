//! In-memory development handler.
//!
//! `DevRegistry` is shared by every connection; `DevServer` is one per
//! connection and remembers which device authenticated on it. Nothing is
//! persisted.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::{SensorData, PROTOCOL_VERSION};

use crate::dispatch::{AuthGrant, JoinDecision, Server, TypeDefinition};
use crate::transport::Conn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: u32,
    pub uuid: String,
    pub type_id: u32,
    pub rf_addr: u16,
    /// `(parent_device_id, port)` for wired devices.
    pub parent: Option<(u32, u16)>,
}

/// Devices and type definitions: device_id -> record, uuid -> device_id.
pub struct DevRegistry {
    devices: DashMap<u32, DeviceRecord>,
    by_uuid: DashMap<String, u32>,
    types: DashMap<u32, TypeDefinition>,
    next_device_id: AtomicU32,
    /// Next RF address; `u16` space, kept wider so exhaustion is observable.
    next_rf_addr: AtomicU32,
    samples: AtomicU64,
    auto_approve_joins: bool,
}

impl DevRegistry {
    pub fn new(auto_approve_joins: bool) -> Self {
        Self {
            devices: DashMap::new(),
            by_uuid: DashMap::new(),
            types: DashMap::new(),
            next_device_id: AtomicU32::new(1),
            next_rf_addr: AtomicU32::new(1),
            samples: AtomicU64::new(0),
            auto_approve_joins,
        }
    }

    pub fn define_type(&self, type_id: u32, def: TypeDefinition) {
        self.types.insert(type_id, def);
    }

    pub fn type_definition(&self, type_id: u32) -> TypeDefinition {
        self.types
            .get(&type_id)
            .map(|d| d.value().clone())
            .unwrap_or_else(TypeDefinition::unknown)
    }

    /// Look up `uuid`, creating a record on first sight.
    ///
    /// Fails once device ids or RF addresses run out.
    pub fn enroll(&self, uuid: &str, type_id: u32) -> Result<DeviceRecord> {
        let device_id = match self.by_uuid.entry(uuid.to_string()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let id = allocate(&self.next_device_id, MAX_DEVICE_ID)
                    .ok_or_else(|| HubError::Handler("device ids exhausted".into()))?;
                e.insert(id);
                id
            }
        };

        let res = match self.devices.entry(device_id) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => match allocate(&self.next_rf_addr, MAX_RF_ADDR) {
                Some(rf_addr) => {
                    let rec = DeviceRecord {
                        device_id,
                        uuid: uuid.to_string(),
                        type_id,
                        rf_addr: u16::try_from(rf_addr).unwrap_or(u16::MAX),
                        parent: None,
                    };
                    tracing::info!(device_id, uuid, type_id, rf_addr, "device enrolled");
                    e.insert(rec.clone());
                    Ok(rec)
                }
                None => Err(HubError::Handler("rf addresses exhausted".into())),
            },
        };

        if res.is_err() {
            self.by_uuid.remove_if(uuid, |_, id| *id == device_id);
        }
        res
    }

    pub fn device(&self, device_id: u32) -> Option<DeviceRecord> {
        self.devices.get(&device_id).map(|r| r.value().clone())
    }

    pub fn device_by_uuid(&self, uuid: &str) -> Option<DeviceRecord> {
        let id = *self.by_uuid.get(uuid)?.value();
        self.device(id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn samples_received(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn auto_approve_joins(&self) -> bool {
        self.auto_approve_joins
    }

    /// Attach `uuid` below `parent` at `port`. Returns 0 when the parent is unknown.
    pub fn attach(&self, parent_device_id: u32, uuid: &str, type_id: u32, port: u16) -> Result<u32> {
        if !self.devices.contains_key(&parent_device_id) {
            return Ok(0);
        }
        let device_id = self.enroll(uuid, type_id)?.device_id;
        if let Some(mut rec) = self.devices.get_mut(&device_id) {
            rec.parent = Some((parent_device_id, port));
        }
        Ok(device_id)
    }

    pub fn relocate(&self, parent_device_id: u32, device_id: u32, port: u16) -> Result<()> {
        if !self.devices.contains_key(&parent_device_id) {
            return Err(HubError::Handler(format!(
                "unknown parent device {parent_device_id}"
            )));
        }
        let mut rec = self
            .devices
            .get_mut(&device_id)
            .ok_or_else(|| HubError::Handler(format!("unknown device {device_id}")))?;
        rec.parent = Some((parent_device_id, port));
        Ok(())
    }

    pub fn detach(&self, parent_device_id: u32, device_id: u32) -> Result<()> {
        let mut rec = self
            .devices
            .get_mut(&device_id)
            .ok_or_else(|| HubError::Handler(format!("unknown device {device_id}")))?;
        match rec.parent {
            Some((parent, _)) if parent == parent_device_id => {
                rec.parent = None;
                Ok(())
            }
            _ => Err(HubError::Handler(format!(
                "device {device_id} is not attached to {parent_device_id}"
            ))),
        }
    }
}

const MAX_DEVICE_ID: u32 = u32::MAX - 1;
const MAX_RF_ADDR: u32 = u16::MAX as u32;

/// Take the next value from `counter`, refusing to go past `max`.
/// `max` must stay below `u32::MAX` so the counter itself never wraps.
fn allocate(counter: &AtomicU32, max: u32) -> Option<u32> {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            (n <= max).then_some(n + 1)
        })
        .ok()
}

/// Per-connection handler backed by a shared [`DevRegistry`].
pub struct DevServer {
    devices: Arc<DevRegistry>,
    protocol_version: u32,
    /// Authenticated device id; 0 until authentication succeeds.
    session: AtomicU32,
    key_generation: AtomicU32,
}

impl DevServer {
    pub fn new(devices: Arc<DevRegistry>) -> Self {
        Self::with_protocol_version(devices, PROTOCOL_VERSION)
    }

    pub fn with_protocol_version(devices: Arc<DevRegistry>, protocol_version: u32) -> Self {
        Self {
            devices,
            protocol_version,
            session: AtomicU32::new(0),
            key_generation: AtomicU32::new(0),
        }
    }

    pub fn authenticated_device(&self) -> Option<u32> {
        match self.session.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    fn require_auth(&self) -> Result<u32> {
        self.authenticated_device().ok_or(HubError::Unauthorized)
    }
}

#[async_trait]
impl Server for DevServer {
    async fn hello(&self, _conn: &Arc<Conn>, client_version: u32) -> u32 {
        tracing::debug!(client_version, "hello");
        self.protocol_version
    }

    async fn authenticate(
        &self,
        _conn: &Arc<Conn>,
        uuid: &str,
        type_id: u32,
        key: &str,
    ) -> Result<AuthGrant> {
        if uuid.is_empty() {
            return Err(HubError::Handler("uuid must not be empty".into()));
        }
        if key.is_empty() {
            return Err(HubError::Unauthorized);
        }

        let rec = self.devices.enroll(uuid, type_id)?;
        self.session.store(rec.device_id, Ordering::Release);
        let generation = self.key_generation.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::info!(device_id = rec.device_id, uuid, "authenticated");
        Ok(AuthGrant {
            device_id: rec.device_id,
            rf_addr: rec.rf_addr,
            new_key: format!("dev-{}-{generation}", rec.device_id),
        })
    }

    async fn get_rf_addr(&self, _conn: &Arc<Conn>, device_id: u32) -> Result<Option<u16>> {
        self.require_auth()?;
        Ok(self.devices.device(device_id).map(|rec| rec.rf_addr))
    }

    async fn join_request(&self, _conn: &Arc<Conn>, uuid: &str, type_id: u32) -> Result<JoinDecision> {
        self.require_auth()?;

        if let Some(rec) = self.devices.device_by_uuid(uuid) {
            return Ok(JoinDecision::Approved {
                device_id: rec.device_id,
                rf_addr: rec.rf_addr,
            });
        }
        if !self.devices.auto_approve_joins() {
            tracing::info!(uuid, type_id, "join request pending");
            return Ok(JoinDecision::Pending);
        }

        let rec = self.devices.enroll(uuid, type_id)?;
        Ok(JoinDecision::Approved {
            device_id: rec.device_id,
            rf_addr: rec.rf_addr,
        })
    }

    async fn connect_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        uuid: &str,
        type_id: u32,
        port: u16,
    ) -> Result<u32> {
        self.require_auth()?;
        self.devices.attach(parent_device_id, uuid, type_id, port)
    }

    async fn disconnect_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
    ) -> Result<()> {
        self.require_auth()?;
        self.devices.detach(parent_device_id, device_id)
    }

    async fn move_device(
        &self,
        _conn: &Arc<Conn>,
        parent_device_id: u32,
        device_id: u32,
        port: u16,
    ) -> Result<()> {
        self.require_auth()?;
        self.devices.relocate(parent_device_id, device_id, port)
    }

    async fn get_type(&self, _conn: &Arc<Conn>, type_id: u32) -> Result<TypeDefinition> {
        self.require_auth()?;
        Ok(self.devices.type_definition(type_id))
    }

    async fn sensor_data(&self, _conn: &Arc<Conn>, data: SensorData) -> Result<()> {
        self.require_auth()?;
        if self.devices.device(data.device_id).is_none() {
            return Err(HubError::Handler(format!(
                "sensor data for unknown device {}",
                data.device_id
            )));
        }
        self.devices.samples.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            device_id = data.device_id,
            timestamp = data.timestamp,
            values = data.values.len(),
            "sensor data"
        );
        Ok(())
    }

    async fn on_close(&self) {
        tracing::info!(device_id = ?self.authenticated_device(), "session ended");
    }
}
