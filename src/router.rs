use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RouterConfig;
use crate::error::{ConfigError, Error, ForwardError};
use crate::network::{Direction, Interface};
use crate::protocol::{Advertisement, Packet, PacketCodec, RouteManager, RoutingTable, Via};
use crate::{Cost, NodeId};

/// Longest the control loop sleeps without a wake-up.
const IDLE_WAIT: Duration = Duration::from_millis(100);
const COMMAND_QUEUE: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub forwarded: u64,
    pub delivered: u64,
    pub unreachable: u64,
    pub congested: u64,
    pub malformed: u64,
    pub advertisements_received: u64,
    pub advertisements_sent: u64,
    pub advertisements_lost: u64,
}

/// Read-only projection of a router's state, republished whenever the
/// control loop changes it.
#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub id: NodeId,
    pub name: String,
    pub table: RoutingTable,
    pub stats: RouterStats,
    /// When the routing table last changed. Counter updates leave it alone.
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterCommand {
    /// Change the cost of the link on an interface.
    SetLinkCost { interface: usize, cost: Cost },
    /// Send the current distance vector to every neighbor now.
    Advertise,
}

pub struct Router {
    id: NodeId,
    name: String,
    interfaces: Vec<Arc<Interface>>,
    routes: RouteManager,
    codec: PacketCodec,
    doorbell: Arc<Notify>,
    update_interval: Option<Duration>,
    stats: RouterStats,
    status: watch::Sender<RouterStatus>,
    status_dirty: bool,
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Router {
    pub fn new(config: &RouterConfig, codec: PacketCodec) -> Result<Self, ConfigError> {
        let links = config.links()?;
        for link in &links {
            if !codec.fits(link.neighbor) {
                return Err(ConfigError::AddressTooWide {
                    id: link.neighbor,
                    width: codec.dst_width(),
                });
            }
        }

        let doorbell = Arc::new(Notify::new());
        let interfaces = (0..links.len())
            .map(|_| Arc::new(Interface::with_doorbell(config.queue_capacity, doorbell.clone())))
            .collect();
        let routes = RouteManager::new(config.id, links, config.split_horizon);

        let (status, _) = watch::channel(RouterStatus {
            id: config.id,
            name: config.name.clone(),
            table: routes.table().clone(),
            stats: RouterStats::default(),
            last_update: Utc::now(),
        });

        let router = Self {
            id: config.id,
            name: config.name.clone(),
            interfaces,
            routes,
            codec,
            doorbell,
            update_interval: config.update_interval(),
            stats: RouterStats::default(),
            status,
            status_dirty: false,
        };
        info!(
            "{}: initialized with {} interfaces, {} routes",
            router,
            router.interfaces.len(),
            router.routes.table().len()
        );
        Ok(router)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interface(&self, index: usize) -> Option<Arc<Interface>> {
        self.interfaces.get(index).cloned()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    pub fn routing_table(&self) -> &RoutingTable {
        self.routes.table()
    }

    pub fn route_manager(&self) -> &RouteManager {
        &self.routes
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// One sweep over all interfaces in index order, taking at most one
    /// frame from each. Returns how many frames were handled.
    pub fn process_queues(&mut self) -> usize {
        let mut handled = 0;
        for i in 0..self.interfaces.len() {
            let Some(frame) = self.interfaces[i].get(Direction::Inbound) else {
                continue;
            };
            handled += 1;
            self.status_dirty = true;

            match self.codec.decode(frame) {
                Ok(Packet::Data {
                    destination,
                    payload,
                }) => {
                    if let Err(e) = self.forward(destination, payload, i) {
                        self.record_drop(&e, i);
                    }
                }
                Ok(Packet::Control { payload }) => self.update_routes(&payload, i),
                Err(e) => {
                    self.stats.malformed += 1;
                    warn!("{}: dropping malformed packet on interface {}: {}", self, i, e);
                }
            }
        }
        handled
    }

    /// Sends a data packet toward `destination` according to the routing table.
    pub fn forward(&mut self, destination: NodeId, payload: Bytes, from: usize) -> Result<(), ForwardError> {
        let entry = self
            .routes
            .table()
            .get(destination)
            .copied()
            .ok_or(ForwardError::Unreachable(destination))?;

        let interface = match entry.via {
            Via::Local => {
                self.stats.delivered += 1;
                info!(
                    "{}: received packet for itself from interface {} ({} bytes)",
                    self,
                    from,
                    payload.len()
                );
                return Ok(());
            }
            Via::Interface(i) => i,
        };

        let frame = self.codec.encode(&Packet::Data {
            destination,
            payload,
        })?;
        self.interfaces[interface]
            .try_put(Direction::Outbound, frame)
            .map_err(|source| ForwardError::Congestion { interface, source })?;

        self.stats.forwarded += 1;
        debug!(
            "{}: forwarding packet for {} from interface {} to {}",
            self, destination, from, interface
        );
        Ok(())
    }

    fn record_drop(&mut self, err: &ForwardError, from: usize) {
        match err {
            ForwardError::Unreachable(_) => self.stats.unreachable += 1,
            ForwardError::Congestion { .. } => self.stats.congested += 1,
            ForwardError::Encode(_) => self.stats.malformed += 1,
        }
        warn!("{}: packet from interface {} lost: {}", self, from, err);
    }

    fn update_routes(&mut self, payload: &[u8], interface: usize) {
        let advert = match Advertisement::decode(payload) {
            Ok(advert) => advert,
            Err(e) => {
                self.stats.malformed += 1;
                warn!("{}: dropping advertisement on interface {}: {}", self, interface, e);
                return;
            }
        };
        self.stats.advertisements_received += 1;
        debug!(
            "{}: advertisement from {} on interface {} with {} routes",
            self,
            advert.origin,
            interface,
            advert.routes.len()
        );

        if self.routes.process_advertisement(&advert, interface) {
            self.broadcast();
        }
    }

    /// Sends the current distance vector on every interface. Never blocks:
    /// an advertisement that does not fit is lost and healed by a later one.
    pub fn broadcast(&mut self) {
        for i in 0..self.interfaces.len() {
            let frame = self
                .routes
                .advertisement_for(i)
                .encode()
                .and_then(|payload| self.codec.encode(&Packet::Control { payload }));
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    error!("{}: cannot encode advertisement: {}", self, e);
                    return;
                }
            };

            match self.interfaces[i].try_put(Direction::Outbound, frame) {
                Ok(()) => {
                    self.stats.advertisements_sent += 1;
                    debug!("{}: sent routing update on interface {}", self, i);
                }
                Err(e) => {
                    self.stats.advertisements_lost += 1;
                    warn!("{}: routing update on interface {} lost: {}", self, i, e);
                }
            }
        }
        self.status_dirty = true;
    }

    pub fn handle_command(&mut self, command: RouterCommand) {
        match command {
            RouterCommand::SetLinkCost { interface, cost } => match self.routes.set_link_cost(interface, cost) {
                Ok(true) => self.broadcast(),
                Ok(false) => {}
                Err(e) => warn!("{}: {}", self, e),
            },
            RouterCommand::Advertise => self.broadcast(),
        }
    }

    fn publish_status(&mut self) {
        if !self.status_dirty {
            return;
        }
        self.status_dirty = false;
        let table = self.routes.table();
        let stats = self.stats;
        self.status.send_if_modified(|status| {
            let table_changed = status.table != *table;
            if !table_changed && status.stats == stats {
                return false;
            }
            if table_changed {
                status.table = table.clone();
                status.last_update = Utc::now();
            }
            status.stats = stats;
            true
        });
    }

    pub fn start(self) -> RouterHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let id = self.id;
        let status = self.status.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx, command_rx));

        RouterHandle {
            id,
            status,
            commands: command_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>, mut commands: mpsc::Receiver<RouterCommand>) {
        info!("{}: starting", self);
        let doorbell = self.doorbell.clone();
        self.broadcast();
        let mut next_update = self.update_interval.map(|every| Instant::now() + every);
        let mut commands_open = true;

        loop {
            let handled = self.process_queues();
            while let Ok(command) = commands.try_recv() {
                self.handle_command(command);
            }
            if let (Some(at), Some(every)) = (next_update, self.update_interval) {
                if Instant::now() >= at {
                    self.broadcast();
                    next_update = Some(Instant::now() + every);
                }
            }
            self.publish_status();

            if *shutdown.borrow() {
                break;
            }
            if handled > 0 {
                tokio::task::yield_now().await;
                continue;
            }

            let wait = next_update
                .map(|at| at.saturating_duration_since(Instant::now()).min(IDLE_WAIT))
                .unwrap_or(IDLE_WAIT);
            tokio::select! {
                _ = doorbell.notified() => {}
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => commands_open = false,
                },
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.publish_status();
        info!("{}: ending", self);
    }
}

/// Control surface of a running router.
pub struct RouterHandle {
    id: NodeId,
    status: watch::Receiver<RouterStatus>,
    commands: mpsc::Sender<RouterCommand>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RouterHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Snapshot of the routing table as of the last published status.
    pub fn routing_table(&self) -> RoutingTable {
        self.status.borrow().table.clone()
    }

    pub fn stats(&self) -> RouterStats {
        self.status.borrow().stats
    }

    /// A receiver that observes every republished status.
    pub fn status(&self) -> watch::Receiver<RouterStatus> {
        self.status.clone()
    }

    pub async fn set_link_cost(&self, interface: usize, cost: Cost) -> Result<(), Error> {
        self.send(RouterCommand::SetLinkCost { interface, cost }).await
    }

    pub async fn advertise(&self) -> Result<(), Error> {
        self.send(RouterCommand::Advertise).await
    }

    async fn send(&self, command: RouterCommand) -> Result<(), Error> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Stopped(self.id))
    }

    /// Asks the control loop to stop after its current sweep.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("router {} task failed: {}", self.id, e);
        }
    }
}
