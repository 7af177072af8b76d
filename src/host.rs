use bytes::Bytes;
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::NodeId;
use crate::config::HostConfig;
use crate::error::FormatError;
use crate::network::{Direction, Interface};
use crate::protocol::{Packet, PacketCodec};

/// An end system with a single unbounded interface. Hosts only produce and
/// consume data packets; routing updates that reach them are ignored.
pub struct Host {
    id: NodeId,
    name: String,
    interface: Arc<Interface>,
    codec: PacketCodec,
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Host {
    pub fn new(config: &HostConfig, codec: PacketCodec) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            interface: Arc::new(Interface::new(None)),
            codec,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interface(&self) -> Arc<Interface> {
        self.interface.clone()
    }

    /// Encodes a data packet and enqueues it, waiting for space if needed.
    pub async fn send(&self, destination: NodeId, payload: impl Into<Bytes>) -> Result<(), FormatError> {
        let frame = self.codec.encode(&Packet::data(destination, payload))?;
        self.interface.put(Direction::Outbound, frame).await;
        info!("{}: sent packet to {}", self, destination);
        Ok(())
    }

    /// Polls the interface once for a data packet.
    pub fn receive(&self) -> Option<Packet> {
        let frame = self.interface.get(Direction::Inbound)?;
        self.accept(frame)
    }

    fn accept(&self, frame: Bytes) -> Option<Packet> {
        match self.codec.decode(frame) {
            Ok(packet @ Packet::Data { .. }) => {
                info!(
                    "{}: received packet \"{}\"",
                    self,
                    String::from_utf8_lossy(packet.payload())
                );
                Some(packet)
            }
            Ok(Packet::Control { .. }) => None,
            Err(e) => {
                warn!("{}: dropping malformed packet: {}", self, e);
                None
            }
        }
    }

    /// Runs a receive loop that hands every data packet to the returned
    /// handle. The loop becomes the only consumer of the inbound queue.
    pub fn start(self) -> HostHandle {
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let host = Arc::new(self);
        let handle_host = host.clone();

        let task = tokio::spawn(async move {
            info!("{}: starting", host);
            loop {
                tokio::select! {
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    frame = host.interface.recv(Direction::Inbound) => {
                        if let Some(packet) = host.accept(frame) {
                            // The handle may already be gone; keep draining.
                            let _ = inbox_tx.send(packet);
                        }
                    }
                }
            }
            info!("{}: ending", host);
        });

        HostHandle {
            host: handle_host,
            inbox,
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct HostHandle {
    host: Arc<Host>,
    inbox: mpsc::UnboundedReceiver<Packet>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

impl HostHandle {
    pub fn id(&self) -> NodeId {
        self.host.id
    }

    pub async fn send(&self, destination: NodeId, payload: impl Into<Bytes>) -> Result<(), FormatError> {
        self.host.send(destination, payload).await
    }

    /// Next delivered data packet; `None` once the receive loop has ended.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.inbox.try_recv().ok()
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("{}: receive task failed: {}", self.host, e);
        }
    }
}
