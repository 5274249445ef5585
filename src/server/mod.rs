mod listener;
mod runtime;

pub use listener::{bind_listener, resolve_bind_addr};
pub use runtime::{run_rendezvous, RendezvousServer};
