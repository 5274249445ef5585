//! Reassembles files from chunks, indexed by `chunkIndex` rather than arrival.

use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};

use super::protocol::{Chunk, FileMetadata};
use super::storage::ReceivedFile;
use crate::common::config::MAX_CHUNK_SIZE_BYTES;

/// Files a peer may have open at once before new metadata is refused.
pub const MAX_IN_FLIGHT_FILES: usize = 64;

/// Result of feeding one message to the [`Reassembler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reassembly {
    /// Dropped: no buffer for the file, a bad index, or a duplicate slot.
    Ignored,
    Progress {
        file_id: String,
        name: String,
        received: u64,
        total: u64,
    },
    Completed(ReceivedFile),
    Failed {
        file_id: String,
        name: String,
        reason: String,
    },
}

struct Assembly {
    metadata: FileMetadata,
    slots: BTreeMap<u64, Bytes>,
}

#[derive(Default)]
pub struct Reassembler {
    files: HashMap<String, Assembly>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files with metadata but not yet complete.
    pub fn in_flight(&self) -> usize {
        self.files.len()
    }

    pub fn on_metadata(&mut self, metadata: FileMetadata) -> Reassembly {
        let capacity = metadata.total_chunks.saturating_mul(MAX_CHUNK_SIZE_BYTES);
        if metadata.total_chunks > metadata.size || metadata.size > capacity {
            return Reassembly::Failed {
                reason: format!(
                    "{} chunks cannot carry {} bytes",
                    metadata.total_chunks, metadata.size
                ),
                file_id: metadata.id,
                name: metadata.name,
            };
        }

        if self.files.len() >= MAX_IN_FLIGHT_FILES && !self.files.contains_key(&metadata.id) {
            tracing::warn!(
                file_id = %metadata.id,
                in_flight = self.files.len(),
                "Too many files in flight, refusing metadata"
            );
            return Reassembly::Failed {
                reason: format!("more than {MAX_IN_FLIGHT_FILES} files in flight"),
                file_id: metadata.id,
                name: metadata.name,
            };
        }

        tracing::info!(
            file_id = %metadata.id,
            name = %metadata.name,
            size = metadata.size,
            total_chunks = metadata.total_chunks,
            "Receiving file"
        );

        let id = metadata.id.clone();
        let assembly = Assembly {
            metadata,
            slots: BTreeMap::new(),
        };
        if self.files.insert(id.clone(), assembly).is_some() {
            tracing::warn!(file_id = %id, "Metadata repeated, restarting file");
        }

        if self.files.get(&id).map(|a| a.metadata.total_chunks) == Some(0) {
            return self.complete(&id);
        }
        Reassembly::Ignored
    }

    pub fn on_chunk(&mut self, chunk: Chunk) -> Reassembly {
        let Some(assembly) = self.files.get_mut(&chunk.file_id) else {
            tracing::debug!(file_id = %chunk.file_id, index = chunk.chunk_index, "Chunk for unknown file, dropping");
            return Reassembly::Ignored;
        };

        let total = assembly.metadata.total_chunks;
        if chunk.total_chunks != total || chunk.chunk_index >= total {
            tracing::debug!(
                file_id = %chunk.file_id,
                index = chunk.chunk_index,
                declared = chunk.total_chunks,
                expected = total,
                "Chunk out of range, dropping"
            );
            return Reassembly::Ignored;
        }

        if assembly.slots.contains_key(&chunk.chunk_index) {
            tracing::debug!(file_id = %chunk.file_id, index = chunk.chunk_index, "Duplicate chunk");
            return Reassembly::Ignored;
        }
        assembly.slots.insert(chunk.chunk_index, chunk.payload);

        let received = assembly.slots.len() as u64;
        if received == total {
            return self.complete(&chunk.file_id);
        }

        Reassembly::Progress {
            file_id: chunk.file_id,
            name: assembly.metadata.name.clone(),
            received,
            total,
        }
    }

    /// Concatenate in index order and drop all state for the file.
    fn complete(&mut self, file_id: &str) -> Reassembly {
        let Some(Assembly { metadata, slots }) = self.files.remove(file_id) else {
            return Reassembly::Ignored;
        };

        let actual: usize = slots.values().map(Bytes::len).sum();
        if actual as u64 != metadata.size {
            tracing::warn!(
                file_id = %metadata.id,
                expected = metadata.size,
                actual,
                "Assembled size mismatch"
            );
            return Reassembly::Failed {
                reason: format!("assembled {actual} bytes, expected {}", metadata.size),
                file_id: metadata.id,
                name: metadata.name,
            };
        }

        let mut data = BytesMut::with_capacity(actual);
        for payload in slots.values() {
            data.extend_from_slice(payload);
        }

        tracing::info!(file_id = %metadata.id, name = %metadata.name, "File received");
        Reassembly::Completed(ReceivedFile {
            id: metadata.id,
            name: metadata.name,
            mime_type: metadata.mime_type,
            data: data.freeze(),
        })
    }
}
