//! Chunked file transfer over a [`PeerChannel`](crate::channel::PeerChannel).

pub mod chunker;
pub mod heartbeat;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod storage;

pub use chunker::{total_chunks, OutgoingFile, DEFAULT_MIME_TYPE};
pub use heartbeat::spawn_heartbeat;
pub use protocol::{Chunk, FileMetadata, WireMessage};
pub use receiver::{Reassembler, Reassembly};
pub use sender::{FileSender, NoProgress, ProgressSink};
pub use session::{SessionEvent, TransferSession};
pub use storage::ReceivedFile;
