//! Files queued for sending and their chunk sequence.

use bytes::Bytes;
use std::path::Path;

use super::protocol::{Chunk, FileMetadata};
use crate::common::TransferError;

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// `ceil(size / chunk_size)`; zero for empty files.
pub fn total_chunks(size: u64, chunk_size: u64) -> u64 {
    size.div_ceil(chunk_size)
}

/// Sniff a mime type from magic bytes.
pub fn sniff_mime(data: &[u8]) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}

/// A file held in memory, ready to be chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl OutgoingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Build from raw bytes, sniffing the mime type from content.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mime_type = sniff_mime(&data);
        Self {
            name: name.into(),
            mime_type,
            data,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Ok(Self::from_bytes(name, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn metadata(&self, id: String, chunk_size: u64) -> FileMetadata {
        FileMetadata {
            id,
            name: self.name.clone(),
            size: self.size(),
            mime_type: self.mime_type.clone(),
            total_chunks: total_chunks(self.size(), chunk_size),
        }
    }

    /// Chunks in index order. Payloads share the file's buffer.
    pub fn chunks<'a>(&'a self, file_id: &'a str, chunk_size: u64) -> impl Iterator<Item = Chunk> + 'a {
        let total = total_chunks(self.size(), chunk_size);
        let chunk_size = chunk_size as usize;
        (0..total).map(move |index| {
            let start = index as usize * chunk_size;
            let end = (start + chunk_size).min(self.data.len());
            Chunk {
                file_id: file_id.to_string(),
                chunk_index: index,
                total_chunks: total,
                payload: self.data.slice(start..end),
            }
        })
    }
}
