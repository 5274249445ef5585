pub mod channel;
pub mod common;
pub mod connection;
pub mod orchestrator;
pub mod pipeline;
pub mod rendezvous;
pub mod server;
pub mod signaling;
pub mod transfer;
pub mod utils;
