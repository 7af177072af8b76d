//! Error types
//!
//! Per-packet errors ([`FormatError`], [`LinkError`], [`ForwardError`]) are
//! logged and the packet dropped; only [`ConfigError`] is fatal.

use thiserror::Error;

use crate::network::Direction;
use crate::NodeId;

/// Malformed packet or advertisement bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("frame of {len} bytes is shorter than the {header}-byte header")]
    Truncated { len: usize, header: usize },

    #[error("destination field {0:?} is not a decimal address")]
    InvalidDestination(String),

    #[error("destination {id} does not fit in {width} digits")]
    DestinationTooWide { id: NodeId, width: usize },

    #[error("unknown packet type code {0:?}")]
    UnknownType(char),

    #[error("malformed advertisement: {0}")]
    Advertisement(String),
}

/// Interface queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{direction} queue is full ({capacity} packets)")]
    QueueFull { direction: Direction, capacity: usize },
}

/// Reasons a data packet could not be forwarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("no route to {0}")]
    Unreachable(NodeId),

    #[error("congestion on interface {interface}: {source}")]
    Congestion {
        interface: usize,
        #[source]
        source: LinkError,
    },

    #[error("cannot re-encode packet: {0}")]
    Encode(#[from] FormatError),
}

/// Invalid router or topology configuration, detected before anything runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("router {0} has no links")]
    NoLinks(NodeId),

    #[error("router {0} lists itself as a neighbor")]
    SelfLink(NodeId),

    #[error("router {router}: neighbor {neighbor} has no interface")]
    NoInterface { router: NodeId, neighbor: NodeId },

    #[error("node {node}: interface {interface} is used more than once")]
    DuplicateInterface { node: NodeId, interface: usize },

    #[error("node {node}: interface {interface} out of range (node has {count})")]
    InterfaceOutOfRange { node: NodeId, interface: usize, count: usize },

    #[error("node {node}: unknown interface {interface}")]
    UnknownInterface { node: NodeId, interface: usize },

    #[error("node id {0} is used more than once")]
    DuplicateNode(NodeId),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node id {id} does not fit in {width} address digits")]
    AddressTooWide { id: NodeId, width: usize },

    #[error("address width {0} must be between 1 and 10 digits")]
    InvalidAddressWidth(usize),

    #[error("node {0}: queue capacity must be at least 1")]
    ZeroCapacity(NodeId),

    #[error("wire connects node {0} to itself")]
    LoopedWire(NodeId),

    #[error("router {router} expects neighbor {expected} on interface {interface}, wire leads to {found}")]
    NeighborMismatch {
        router: NodeId,
        interface: usize,
        expected: NodeId,
        found: NodeId,
    },
}

/// Umbrella error for the public API
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("node {0} has stopped")]
    Stopped(NodeId),
}

pub type Result<T> = std::result::Result<T, Error>;
