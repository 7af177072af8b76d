use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::Link;
use crate::{Cost, NodeId};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 2000;

fn default_queue_capacity() -> Option<usize> {
    Some(DEFAULT_QUEUE_CAPACITY)
}

fn default_update_interval() -> Option<u64> {
    Some(DEFAULT_UPDATE_INTERVAL_MS)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub id: NodeId,
    pub name: String,
    /// neighbor -> { local interface -> link cost }
    pub neighbors: BTreeMap<NodeId, BTreeMap<usize, Cost>>,
    /// Per-queue bound; `null` means unbounded.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: Option<usize>,
    /// Period of the healing broadcast; `null` disables it.
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: Option<u64>,
    #[serde(default)]
    pub split_horizon: bool,
}

impl RouterConfig {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            neighbors: BTreeMap::new(),
            queue_capacity: default_queue_capacity(),
            update_interval_ms: default_update_interval(),
            split_horizon: false,
        }
    }

    pub fn with_neighbor(mut self, neighbor: NodeId, interface: usize, cost: Cost) -> Self {
        self.neighbors.entry(neighbor).or_default().insert(interface, cost);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_update_interval(mut self, interval: Option<Duration>) -> Self {
        self.update_interval_ms = interval.map(|d| d.as_millis() as u64);
        self
    }

    pub fn with_split_horizon(mut self, enabled: bool) -> Self {
        self.split_horizon = enabled;
        self
    }

    pub fn update_interval(&self) -> Option<Duration> {
        self.update_interval_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    pub fn interface_count(&self) -> usize {
        self.neighbors.values().map(BTreeMap::len).sum()
    }

    /// Validates the neighbor table and flattens it into links ordered by
    /// interface. Interfaces must be numbered `0..interface_count()`.
    pub fn links(&self) -> Result<Vec<Link>, ConfigError> {
        if self.neighbors.is_empty() {
            return Err(ConfigError::NoLinks(self.id));
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::ZeroCapacity(self.id));
        }

        let count = self.interface_count();
        let mut seen = BTreeSet::new();
        let mut links = Vec::with_capacity(count);
        for (&neighbor, interfaces) in &self.neighbors {
            if neighbor == self.id {
                return Err(ConfigError::SelfLink(self.id));
            }
            if interfaces.is_empty() {
                return Err(ConfigError::NoInterface {
                    router: self.id,
                    neighbor,
                });
            }
            for (&interface, &cost) in interfaces {
                if !seen.insert(interface) {
                    return Err(ConfigError::DuplicateInterface {
                        node: self.id,
                        interface,
                    });
                }
                if interface >= count {
                    return Err(ConfigError::InterfaceOutOfRange {
                        node: self.id,
                        interface,
                        count,
                    });
                }
                links.push(Link {
                    neighbor,
                    interface,
                    cost,
                });
            }
        }

        links.sort_by_key(|l| l.interface);
        Ok(links)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub node: NodeId,
    #[serde(default)]
    pub interface: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConfig {
    pub a: EndpointConfig,
    pub b: EndpointConfig,
    /// Frames longer than this are lost on the wire.
    #[serde(default)]
    pub mtu: Option<usize>,
}

impl WireConfig {
    pub fn new(a: (NodeId, usize), b: (NodeId, usize)) -> Self {
        Self {
            a: EndpointConfig {
                node: a.0,
                interface: a.1,
            },
            b: EndpointConfig {
                node: b.0,
                interface: b.1,
            },
            mtu: None,
        }
    }

    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = Some(mtu);
        self
    }
}
