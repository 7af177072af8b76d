use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Endpoint, Interface, Wire};
use crate::NodeId;
use crate::config::{EndpointConfig, NetworkConfig};
use crate::error::ConfigError;
use crate::host::{Host, HostHandle};
use crate::protocol::{PacketCodec, RoutingTable};
use crate::router::{Router, RouterHandle, RouterStatus};

/// A validated, fully wired network that has not started yet.
pub struct Network {
    codec: PacketCodec,
    hosts: BTreeMap<NodeId, Host>,
    routers: BTreeMap<NodeId, Router>,
    wires: Vec<Wire>,
}

impl Network {
    pub fn build(config: &NetworkConfig) -> Result<Self, ConfigError> {
        let codec = config.codec()?;

        let mut ids = BTreeSet::new();
        let all_ids = config.hosts.iter().map(|h| h.id).chain(config.routers.iter().map(|r| r.id));
        for id in all_ids {
            if !ids.insert(id) {
                return Err(ConfigError::DuplicateNode(id));
            }
            if !codec.fits(id) {
                return Err(ConfigError::AddressTooWide {
                    id,
                    width: codec.dst_width(),
                });
            }
        }

        let mut network = Network {
            codec,
            hosts: config.hosts.iter().map(|h| (h.id, Host::new(h, codec))).collect(),
            routers: BTreeMap::new(),
            wires: Vec::with_capacity(config.wires.len()),
        };
        for rc in &config.routers {
            network.routers.insert(rc.id, Router::new(rc, codec)?);
        }

        let mut used = BTreeSet::new();
        for wire in &config.wires {
            if wire.a.node == wire.b.node {
                return Err(ConfigError::LoopedWire(wire.a.node));
            }
            for (this, peer) in [(&wire.a, &wire.b), (&wire.b, &wire.a)] {
                if !used.insert((this.node, this.interface)) {
                    return Err(ConfigError::DuplicateInterface {
                        node: this.node,
                        interface: this.interface,
                    });
                }
                network.check_neighbor(this, peer.node)?;
            }

            let a = network.endpoint(&wire.a)?;
            let b = network.endpoint(&wire.b)?;
            network.wires.push(Wire::new(a, b, wire.mtu));
        }

        for router in network.routers.values() {
            for i in 0..router.interface_count() {
                if !used.contains(&(router.id(), i)) {
                    warn!("{}: interface {} is not wired", router, i);
                }
            }
        }
        for host in network.hosts.values() {
            if !used.contains(&(host.id(), 0)) {
                warn!("{}: not wired to the network", host);
            }
        }

        Ok(network)
    }

    fn endpoint(&self, ep: &EndpointConfig) -> Result<Endpoint, ConfigError> {
        let (label, interface) = self.resolve(ep)?;
        Ok(Endpoint { label, interface })
    }

    fn resolve(&self, ep: &EndpointConfig) -> Result<(String, Arc<Interface>), ConfigError> {
        let out_of_range = |count| ConfigError::InterfaceOutOfRange {
            node: ep.node,
            interface: ep.interface,
            count,
        };

        if let Some(host) = self.hosts.get(&ep.node) {
            if ep.interface != 0 {
                return Err(out_of_range(1));
            }
            return Ok((host.name().to_string(), host.interface()));
        }
        if let Some(router) = self.routers.get(&ep.node) {
            let interface = router
                .interface(ep.interface)
                .ok_or_else(|| out_of_range(router.interface_count()))?;
            return Ok((format!("{}.{}", router.name(), ep.interface), interface));
        }
        Err(ConfigError::UnknownNode(ep.node))
    }

    /// A router's neighbor table must agree with where its wires lead.
    fn check_neighbor(&self, ep: &EndpointConfig, peer: NodeId) -> Result<(), ConfigError> {
        let Some(router) = self.routers.get(&ep.node) else {
            return Ok(());
        };
        let link = router.route_manager().link(ep.interface).ok_or(ConfigError::InterfaceOutOfRange {
            node: ep.node,
            interface: ep.interface,
            count: router.interface_count(),
        })?;
        if link.neighbor != peer {
            return Err(ConfigError::NeighborMismatch {
                router: ep.node,
                interface: ep.interface,
                expected: link.neighbor,
                found: peer,
            });
        }
        Ok(())
    }

    pub fn codec(&self) -> PacketCodec {
        self.codec
    }

    pub fn host(&self, id: NodeId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    pub fn router(&self, id: NodeId) -> Option<&Router> {
        self.routers.get(&id)
    }

    /// Spawns every wire, router and host task.
    pub fn start(self) -> RunningNetwork {
        let (wire_shutdown, wire_rx) = watch::channel(false);
        let wires = self
            .wires
            .into_iter()
            .flat_map(|wire| wire.start(wire_rx.clone()))
            .collect();
        let routers = self.routers.into_iter().map(|(id, r)| (id, r.start())).collect();
        let hosts = self.hosts.into_iter().map(|(id, h)| (id, h.start())).collect();

        info!("network started");
        RunningNetwork {
            hosts,
            routers,
            wires,
            wire_shutdown,
        }
    }
}

pub struct RunningNetwork {
    hosts: BTreeMap<NodeId, HostHandle>,
    routers: BTreeMap<NodeId, RouterHandle>,
    wires: Vec<JoinHandle<()>>,
    wire_shutdown: watch::Sender<bool>,
}

impl RunningNetwork {
    pub fn host(&self, id: NodeId) -> Option<&HostHandle> {
        self.hosts.get(&id)
    }

    pub fn host_mut(&mut self, id: NodeId) -> Option<&mut HostHandle> {
        self.hosts.get_mut(&id)
    }

    pub fn router(&self, id: NodeId) -> Option<&RouterHandle> {
        self.routers.get(&id)
    }

    pub fn routers(&self) -> impl Iterator<Item = &RouterHandle> {
        self.routers.values()
    }

    pub fn routing_tables(&self) -> BTreeMap<NodeId, RoutingTable> {
        self.routers.iter().map(|(&id, r)| (id, r.routing_table())).collect()
    }

    pub fn statuses(&self) -> Vec<RouterStatus> {
        self.routers.values().map(|r| r.status().borrow().clone()).collect()
    }

    pub async fn stop(self) {
        for router in self.routers.values() {
            router.stop();
        }
        for host in self.hosts.values() {
            host.stop();
        }
        let _ = self.wire_shutdown.send(true);

        for router in self.routers.into_values() {
            router.join().await;
        }
        for host in self.hosts.into_values() {
            host.join().await;
        }
        for wire in self.wires {
            if let Err(e) = wire.await {
                warn!("wire task failed: {}", e);
            }
        }
        info!("network stopped");
    }
}
