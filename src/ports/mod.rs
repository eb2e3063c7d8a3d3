//! Port traits: the seams between domain logic and infrastructure.

pub mod config_port;
pub mod store_port;
