//! Port traits: the collaborators the domain consumes.

pub mod config_port;
pub mod data_port;
pub mod executor_port;
pub mod market_port;
