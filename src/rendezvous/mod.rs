//! Code-addressed rendezvous mailbox and its HTTP surface.

pub mod code;
pub mod handlers;
pub mod messages;
pub mod routes;
pub mod state;
pub mod store;
pub mod sweeper;

pub use code::{generate_share_code, normalize_code, DEFAULT_CODE_LENGTH};
pub use messages::{RoomSnapshot, RoomStatus, SignalAction, SignalRequest};
pub use routes::create_router;
pub use state::RendezvousState;
pub use store::{CreateOutcome, RoomStore};
pub use sweeper::spawn_sweeper;
