//! Distance-vector route relaxation
//!
//! A route is adopted when it is new, strictly cheaper, or when the next hop
//! we already use for that destination re-advertises a different cost. The
//! last rule lets cost increases propagate instead of leaving stale lower
//! bounds in the table. Count-to-infinity is possible and not guarded against.

use log::{debug, info, warn};
use std::collections::BTreeMap;

use super::{Advertisement, RouteEntry, RoutingTable, Via};
use crate::error::ConfigError;
use crate::{Cost, NodeId};

/// A direct connection to a neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub neighbor: NodeId,
    pub interface: usize,
    pub cost: Cost,
}

pub struct RouteManager {
    id: NodeId,
    links: BTreeMap<usize, Link>,
    table: RoutingTable,
    split_horizon: bool,
}

impl RouteManager {
    pub fn new(id: NodeId, links: impl IntoIterator<Item = Link>, split_horizon: bool) -> Self {
        let links: BTreeMap<usize, Link> = links.into_iter().map(|l| (l.interface, l)).collect();

        let mut table = RoutingTable::new();
        table.insert(RouteEntry {
            destination: id,
            cost: 0,
            via: Via::Local,
        });
        for link in links.values() {
            let cheaper = table.cost_to(link.neighbor).is_none_or(|c| link.cost < c);
            if link.neighbor != id && cheaper {
                table.insert(RouteEntry {
                    destination: link.neighbor,
                    cost: link.cost,
                    via: Via::Interface(link.interface),
                });
            }
        }

        Self {
            id,
            links,
            table,
            split_horizon,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn link(&self, interface: usize) -> Option<&Link> {
        self.links.get(&interface)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Applies an advertisement heard on `interface`. Returns whether the
    /// table changed, in which case the caller owes its neighbors an update.
    pub fn process_advertisement(&mut self, advert: &Advertisement, interface: usize) -> bool {
        let Some(link) = self.links.get(&interface).copied() else {
            warn!("{}: advertisement on unknown interface {}", self.id, interface);
            return false;
        };
        if advert.origin == self.id {
            debug!("{}: ignoring own advertisement looped back on interface {}", self.id, interface);
            return false;
        }
        if advert.origin != link.neighbor {
            warn!(
                "{}: advertisement from {} on interface {} which leads to {}, discarding",
                self.id, advert.origin, interface, link.neighbor
            );
            return false;
        }

        let mut changed = false;
        for route in &advert.routes {
            if route.destination == self.id {
                continue;
            }

            let candidate = link.cost.saturating_add(route.cost);
            let adopt = match self.table.get(route.destination) {
                None => true,
                Some(existing) => {
                    candidate < existing.cost
                        || (existing.via == Via::Interface(interface) && candidate != existing.cost)
                }
            };

            if adopt {
                debug!(
                    "{}: route to {} now cost {} via interface {} (from {})",
                    self.id, route.destination, candidate, interface, advert.origin
                );
                self.table.insert(RouteEntry {
                    destination: route.destination,
                    cost: candidate,
                    via: Via::Interface(interface),
                });
                changed = true;
            }
        }

        if changed {
            info!("{}: routing table updated from {}", self.id, advert.origin);
        }
        changed
    }

    /// The distance vector to send on `interface`. With split horizon, routes
    /// learned through that interface are left out.
    pub fn advertisement_for(&self, interface: usize) -> Advertisement {
        let routes = self
            .table
            .iter()
            .filter(|e| !(self.split_horizon && e.via == Via::Interface(interface)))
            .map(|e| (e.destination, e.cost));
        Advertisement::new(self.id, routes)
    }

    /// Changes the cost of the link on `interface`. Every route through that
    /// link moves by the same delta. Returns whether the table changed.
    pub fn set_link_cost(&mut self, interface: usize, cost: Cost) -> Result<bool, ConfigError> {
        let link = self
            .links
            .get_mut(&interface)
            .ok_or(ConfigError::UnknownInterface {
                node: self.id,
                interface,
            })?;
        let old = link.cost;
        if old == cost {
            return Ok(false);
        }
        link.cost = cost;
        let neighbor = link.neighbor;
        info!(
            "{}: link to {} on interface {} cost {} -> {}",
            self.id, neighbor, interface, old, cost
        );

        let mut changed = false;
        for entry in self.table.entries_mut() {
            if entry.via == Via::Interface(interface) {
                entry.cost = entry.cost.saturating_sub(old).saturating_add(cost);
                changed = true;
            }
        }

        // A cheaper direct link may now beat whatever path reached the neighbor.
        if neighbor != self.id && self.table.cost_to(neighbor).is_none_or(|c| cost < c) {
            self.table.insert(RouteEntry {
                destination: neighbor,
                cost,
                via: Via::Interface(interface),
            });
            changed = true;
        }

        Ok(changed)
    }
}
