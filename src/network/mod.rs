pub mod interface;
pub mod topology;
pub mod wire;

pub use interface::*;
pub use topology::*;
pub use wire::*;
