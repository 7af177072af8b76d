pub mod config;
pub mod error;
pub mod host;
pub mod network;
pub mod protocol;
pub mod router;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::{ConfigError, Error, ForwardError, FormatError, LinkError};

/// Cumulative path cost. Link costs are non-negative by construction.
pub type Cost = u32;

/// Address of a host or router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}
