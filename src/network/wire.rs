use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Direction, Interface};

/// One side of a wire.
#[derive(Clone)]
pub struct Endpoint {
    pub label: String,
    pub interface: Arc<Interface>,
}

/// A full-duplex link between two interfaces. Each direction moves frames
/// from one end's outbound queue to the other end's inbound queue; a frame
/// that does not fit (full queue or over the MTU) is lost.
pub struct Wire {
    a: Endpoint,
    b: Endpoint,
    mtu: Option<usize>,
}

impl Wire {
    pub fn new(a: Endpoint, b: Endpoint, mtu: Option<usize>) -> Self {
        Self { a, b, mtu }
    }

    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let Wire { a, b, mtu } = self;
        vec![
            tokio::spawn(carry(a.clone(), b.clone(), mtu, shutdown.clone())),
            tokio::spawn(carry(b, a, mtu, shutdown)),
        ]
    }
}

async fn carry(from: Endpoint, to: Endpoint, mtu: Option<usize>, mut shutdown: watch::Receiver<bool>) {
    debug!("wire {} -> {} up", from.label, to.label);
    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            frame = from.interface.recv(Direction::Outbound) => {
                if mtu.is_some_and(|mtu| frame.len() > mtu) {
                    warn!(
                        "wire {} -> {}: packet of {} bytes exceeds MTU, lost",
                        from.label, to.label, frame.len()
                    );
                    continue;
                }
                if let Err(e) = to.interface.try_put(Direction::Inbound, frame) {
                    warn!("wire {} -> {}: packet lost: {}", from.label, to.label, e);
                }
            }
        }
    }
    debug!("wire {} -> {} down", from.label, to.label);
}
