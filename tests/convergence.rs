//! End-to-end tests: routers running as tasks over wired interfaces.

use std::path::Path;
use std::time::Duration;

use custom_dv::config::{NetworkConfig, RouterConfig, WireConfig};
use custom_dv::network::{Network, RunningNetwork};
use custom_dv::protocol::{Packet, Via};
use custom_dv::{ConfigError, Cost, NodeId};

const SETTLE: Duration = Duration::from_secs(5);
const UPDATE_EVERY: Duration = Duration::from_millis(200);

fn router(id: u32, name: &str) -> RouterConfig {
    RouterConfig::new(NodeId(id), name).with_update_interval(Some(UPDATE_EVERY))
}

/// Waits until `router`'s route to `destination` costs `cost`.
async fn wait_route(net: &RunningNetwork, router: u32, destination: u32, cost: Cost) -> Via {
    let mut status = net.router(NodeId(router)).expect("router exists").status();
    let status = tokio::time::timeout(
        SETTLE,
        status.wait_for(|s| s.table.cost_to(NodeId(destination)) == Some(cost)),
    )
    .await
    .unwrap_or_else(|_| panic!("router {} never reached cost {} to {}", router, cost, destination))
    .expect("router stopped");
    status.table.get(NodeId(destination)).unwrap().via
}

// ============================================================================
// Convergence
// ============================================================================

/// A-B=1, B-C=1, A-C=5
fn triangle() -> NetworkConfig {
    NetworkConfig::default()
        .with_router(router(1, "A").with_neighbor(NodeId(2), 0, 1).with_neighbor(NodeId(3), 1, 5))
        .with_router(router(2, "B").with_neighbor(NodeId(1), 0, 1).with_neighbor(NodeId(3), 1, 1))
        .with_router(router(3, "C").with_neighbor(NodeId(1), 0, 5).with_neighbor(NodeId(2), 1, 1))
        .with_wire(WireConfig::new((NodeId(1), 0), (NodeId(2), 0)))
        .with_wire(WireConfig::new((NodeId(1), 1), (NodeId(3), 0)))
        .with_wire(WireConfig::new((NodeId(2), 1), (NodeId(3), 1)))
}

#[tokio::test]
async fn test_triangle_converges_through_cheaper_path() {
    let net = Network::build(&triangle()).unwrap().start();

    assert_eq!(wait_route(&net, 1, 3, 2).await, Via::Interface(0));
    assert_eq!(wait_route(&net, 3, 1, 2).await, Via::Interface(1));
    assert_eq!(wait_route(&net, 2, 3, 1).await, Via::Interface(1));

    for table in net.routing_tables().values() {
        assert_eq!(table.len(), 3);
    }
    net.stop().await;
}

#[tokio::test]
async fn test_triangle_with_split_horizon() {
    let mut config = triangle();
    for rc in &mut config.routers {
        rc.split_horizon = true;
    }
    let net = Network::build(&config).unwrap().start();

    assert_eq!(wait_route(&net, 1, 3, 2).await, Via::Interface(0));
    assert_eq!(wait_route(&net, 3, 1, 2).await, Via::Interface(1));
    net.stop().await;
}

// ============================================================================
// Link cost changes
// ============================================================================

/// A(1) - B(2) - D(4), all links cost 1
fn line() -> NetworkConfig {
    NetworkConfig::default()
        .with_router(router(1, "A").with_neighbor(NodeId(2), 0, 1))
        .with_router(router(2, "B").with_neighbor(NodeId(1), 0, 1).with_neighbor(NodeId(4), 1, 1))
        .with_router(router(4, "D").with_neighbor(NodeId(2), 0, 1))
        .with_wire(WireConfig::new((NodeId(1), 0), (NodeId(2), 0)))
        .with_wire(WireConfig::new((NodeId(2), 1), (NodeId(4), 0)))
}

#[tokio::test]
async fn test_cost_increase_on_next_hop_link() {
    let net = Network::build(&line()).unwrap().start();
    wait_route(&net, 1, 4, 2).await;

    net.router(NodeId(1)).unwrap().set_link_cost(0, 10).await.unwrap();
    net.router(NodeId(2)).unwrap().set_link_cost(0, 10).await.unwrap();

    assert_eq!(wait_route(&net, 1, 4, 11).await, Via::Interface(0));
    wait_route(&net, 4, 1, 11).await;
    net.stop().await;
}

#[tokio::test]
async fn test_cost_increase_behind_next_hop() {
    let net = Network::build(&line()).unwrap().start();
    wait_route(&net, 1, 4, 2).await;

    net.router(NodeId(2)).unwrap().set_link_cost(1, 7).await.unwrap();
    net.router(NodeId(4)).unwrap().set_link_cost(0, 7).await.unwrap();

    // A only hears about this from B's advertisement.
    assert_eq!(wait_route(&net, 1, 4, 8).await, Via::Interface(0));
    net.stop().await;
}

#[tokio::test]
async fn test_stopped_router_rejects_commands() {
    let net = Network::build(&line()).unwrap().start();
    let a = net.router(NodeId(1)).unwrap();
    a.stop();

    let mut status = a.status();
    // The sender half is dropped once the control loop exits.
    tokio::time::timeout(SETTLE, async {
        while status.changed().await.is_ok() {}
    })
    .await
    .unwrap();
    assert!(a.advertise().await.is_err());
    net.stop().await;
}

// ============================================================================
// Host traffic
// ============================================================================

fn sample_topology() -> NetworkConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("topologies/triangle.json");
    NetworkConfig::load_from_file(path).unwrap()
}

#[tokio::test]
async fn test_hosts_exchange_packets_through_routers() {
    let mut net = Network::build(&sample_topology()).unwrap().start();
    // RA -> RB -> RC -> H2
    assert_eq!(wait_route(&net, 10, 2, 3).await, Via::Interface(1));
    wait_route(&net, 12, 1, 3).await;

    net.host(NodeId(1)).unwrap().send(NodeId(2), "hello H2").await.unwrap();
    let h2 = net.host_mut(NodeId(2)).unwrap();
    let packet = tokio::time::timeout(SETTLE, h2.recv()).await.unwrap();
    assert_eq!(packet, Some(Packet::data(NodeId(2), "hello H2")));

    net.host(NodeId(2)).unwrap().send(NodeId(1), "hello H1").await.unwrap();
    let h1 = net.host_mut(NodeId(1)).unwrap();
    let packet = tokio::time::timeout(SETTLE, h1.recv()).await.unwrap();
    assert_eq!(packet, Some(Packet::data(NodeId(1), "hello H1")));

    let rb = net.router(NodeId(11)).unwrap();
    let mut status = rb.status();
    tokio::time::timeout(SETTLE, status.wait_for(|s| s.stats.forwarded >= 2))
        .await
        .unwrap()
        .unwrap();
    net.stop().await;
}

#[tokio::test]
async fn test_unknown_destination_is_counted() {
    let net = Network::build(&sample_topology()).unwrap().start();
    wait_route(&net, 10, 2, 3).await;

    net.host(NodeId(1)).unwrap().send(NodeId(999), "nowhere").await.unwrap();
    let mut status = net.router(NodeId(10)).unwrap().status();
    tokio::time::timeout(SETTLE, status.wait_for(|s| s.stats.unreachable == 1))
        .await
        .unwrap()
        .unwrap();
    net.stop().await;
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_sample_topology_round_trips() {
    let config = sample_topology();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.json");
    config.save_to_file(&path).unwrap();
    assert_eq!(NetworkConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_mismatched_wiring_is_rejected() {
    let mut config = triangle();
    config.wires[1] = WireConfig::new((NodeId(1), 1), (NodeId(2), 1));

    assert_eq!(
        Network::build(&config).err(),
        Some(ConfigError::NeighborMismatch {
            router: NodeId(1),
            interface: 1,
            expected: NodeId(3),
            found: NodeId(2),
        })
    );
}
