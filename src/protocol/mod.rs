pub mod messages;
pub mod packet;
pub mod route_manager;
pub mod routing_table;

pub use messages::*;
pub use packet::*;
pub use route_manager::*;
pub use routing_table::*;
