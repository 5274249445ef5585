pub mod config;
pub mod config_commands;
pub mod errors;
pub mod retry;

pub use config::{AppConfig, EstablishSettings, RoomSettings, ServerSettings, TransferSettings};
pub use errors::{
    AppError, ChannelError, EstablishError, ProtocolError, RoomError, SignalError, TransferError,
};
pub use retry::{Backoff, RetryPolicy};
