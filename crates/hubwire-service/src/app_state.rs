//! Shared application state for the hubwire service.
//!
//! Built once at startup: the codec registry lives here and is handed to every
//! connection, so there is no process-wide registration.

use std::sync::Arc;

use hubwire_core::error::Result;
use hubwire_core::protocol::Registry;

use crate::config::ServiceConfig;
use crate::services::DevRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    registry: Arc<Registry>,
    devices: Arc<DevRegistry>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ServiceConfig) -> Result<Self> {
        cfg.validate()?;

        let registry = Arc::new(Registry::standard());
        let devices = Arc::new(DevRegistry::new(cfg.dev.auto_approve_joins));

        tracing::debug!(kinds = registry.len(), "codec registry built");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                devices,
            }),
        })
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn devices(&self) -> Arc<DevRegistry> {
        Arc::clone(&self.inner.devices)
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.inner.cfg.wire.max_frame_bytes
    }

    pub fn protocol_version(&self) -> u32 {
        self.inner.cfg.wire.protocol_version
    }
}
