//! Streams one file onto a peer channel with flow control.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::chunker::OutgoingFile;
use super::protocol::{FileMetadata, WireMessage};
use crate::channel::PeerChannel;
use crate::common::config::MAX_CHUNK_SIZE_BYTES;
use crate::common::{TransferError, TransferSettings};

/// Receives per-chunk progress from [`FileSender::send_file`].
pub trait ProgressSink: Send + Sync {
    /// `percent` is `sent / total * 100`.
    fn on_progress(&self, percent: f64, bytes_sent: u64);

    /// Called with `true` when sending stalls on a full buffer and `false`
    /// once it resumes.
    fn on_paused(&self, _paused: bool) {}
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _percent: f64, _bytes_sent: u64) {}
}

pub struct FileSender {
    channel: Arc<dyn PeerChannel>,
    settings: TransferSettings,
    cancel: CancellationToken,
}

impl FileSender {
    pub fn new(channel: Arc<dyn PeerChannel>, mut settings: TransferSettings) -> Self {
        // Settings built by hand skip `AppConfig::validate`. Receivers refuse
        // chunks above the maximum, and both values are divisors.
        settings.chunk_size = settings.chunk_size.clamp(1, MAX_CHUNK_SIZE_BYTES);
        settings.batch_size = settings.batch_size.max(1);
        Self {
            channel,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send metadata, then every chunk in order. Returns the metadata sent.
    pub async fn send_file(
        &self,
        file: &OutgoingFile,
        progress: &dyn ProgressSink,
    ) -> Result<FileMetadata, TransferError> {
        let chunk_size = self.settings.chunk_size;
        let metadata = file.metadata(Uuid::new_v4().to_string(), chunk_size);
        let total = metadata.total_chunks;

        tracing::info!(
            file_id = %metadata.id,
            name = %metadata.name,
            size = metadata.size,
            total_chunks = total,
            "Sending file"
        );

        self.send_message(&WireMessage::Metadata(metadata.clone()))
            .await?;
        self.pause(self.settings.metadata_settle()).await?;

        if total == 0 {
            progress.on_progress(100.0, 0);
            return Ok(metadata);
        }

        let mut sent = 0u64;
        let mut bytes_sent = 0u64;
        for chunk in file.chunks(&metadata.id, chunk_size) {
            self.wait_for_capacity(progress).await?;

            let len = chunk.payload.len() as u64;
            self.send_message(&WireMessage::Chunk(chunk)).await?;
            sent += 1;
            bytes_sent += len;
            progress.on_progress(sent as f64 / total as f64 * 100.0, bytes_sent);

            if sent % u64::from(self.settings.batch_size) == 0 && sent < total {
                self.batch_pause().await?;
            }
        }

        tracing::info!(file_id = %metadata.id, chunks = sent, "File sent");
        Ok(metadata)
    }

    async fn send_message(&self, message: &WireMessage) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if !self.channel.is_open() {
            return Err(TransferError::ChannelClosed);
        }
        let encoded = message.encode()?;
        self.channel.send(encoded).await?;
        Ok(())
    }

    /// Block while the buffer is above the high-water mark.
    async fn wait_for_capacity(&self, progress: &dyn ProgressSink) -> Result<(), TransferError> {
        let high_water_mark = self.settings.high_water_mark;
        let buffered = self.channel.buffered_amount();
        if buffered <= high_water_mark {
            return Ok(());
        }

        tracing::debug!(buffered, high_water_mark, "Send buffer full, waiting to drain");
        progress.on_paused(true);

        let policy = self.settings.send_retry();
        let drained = policy
            .poll(|| async {
                if self.cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }
                if !self.channel.is_open() {
                    return Err(TransferError::ChannelClosed);
                }
                Ok((self.channel.buffered_amount() <= high_water_mark).then_some(()))
            })
            .await;

        progress.on_paused(false);
        match drained? {
            Some(()) => Ok(()),
            None => {
                tracing::warn!(
                    retries = policy.max_attempts,
                    buffered = self.channel.buffered_amount(),
                    "Send buffer never drained"
                );
                Err(TransferError::ChannelSaturated {
                    retries: policy.max_attempts,
                })
            }
        }
    }

    async fn batch_pause(&self) -> Result<(), TransferError> {
        let buffered = self.channel.buffered_amount();
        if buffered > self.settings.batch_threshold {
            let wait = self.settings.batch_pause(buffered);
            tracing::trace!(buffered, wait_ms = wait.as_millis() as u64, "Batch pause");
            self.pause(wait).await?;
        }
        Ok(())
    }

    async fn pause(&self, wait: std::time::Duration) -> Result<(), TransferError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        }
    }
}
