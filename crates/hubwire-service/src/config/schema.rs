use std::net::SocketAddr;

use serde::Deserialize;

use hubwire_core::error::{HubError, Result};
use hubwire_core::protocol::{DEFAULT_MAX_FRAME_BYTES, PROTOCOL_VERSION};

const MIN_FRAME_BYTES: usize = 64;
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub wire: WireSection,

    #[serde(default)]
    pub dev: DevSection,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(HubError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.service.validate()?;
        self.wire.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            HubError::Config(format!("service.listen must be a valid SocketAddr: {e}"))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:7310".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireSection {
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Version this service announces in Hello.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

impl Default for WireSection {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            protocol_version: default_protocol_version(),
        }
    }
}

impl WireSection {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAME_BYTES..=MAX_FRAME_BYTES).contains(&self.max_frame_bytes) {
            return Err(HubError::Config(format!(
                "wire.max_frame_bytes must be between {MIN_FRAME_BYTES} and {MAX_FRAME_BYTES}"
            )));
        }
        if self.protocol_version == 0 {
            return Err(HubError::Config(
                "wire.protocol_version must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
fn default_protocol_version() -> u32 {
    PROTOCOL_VERSION
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DevSection {
    /// Approve every join request immediately instead of leaving it pending.
    #[serde(default)]
    pub auto_approve_joins: bool,
}
