pub mod router_config;

pub use router_config::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::NodeId;
use crate::error::ConfigError;
use crate::protocol::{DEFAULT_DST_WIDTH, MAX_DST_WIDTH, PacketCodec};

fn default_dst_width() -> usize {
    DEFAULT_DST_WIDTH
}

/// A whole simulated network: nodes plus the wires between their interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Digits in the destination field of every packet header.
    #[serde(default = "default_dst_width")]
    pub dst_width: usize,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
    #[serde(default)]
    pub wires: Vec<WireConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dst_width: DEFAULT_DST_WIDTH,
            hosts: vec![],
            routers: vec![],
            wires: vec![],
        }
    }
}

impl NetworkConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("reading topology {}", path.display()))?;
        let config: NetworkConfig =
            serde_json::from_str(&content).with_context(|| format!("parsing topology {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn codec(&self) -> Result<PacketCodec, ConfigError> {
        if !(1..=MAX_DST_WIDTH).contains(&self.dst_width) {
            return Err(ConfigError::InvalidAddressWidth(self.dst_width));
        }
        Ok(PacketCodec::new(self.dst_width))
    }

    pub fn with_host(mut self, id: NodeId, name: impl Into<String>) -> Self {
        self.hosts.push(HostConfig { id, name: name.into() });
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.routers.push(router);
        self
    }

    pub fn with_wire(mut self, wire: WireConfig) -> Self {
        self.wires.push(wire);
        self
    }
}
