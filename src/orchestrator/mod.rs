//! Sends a batch of files one after another over a connected link.

pub mod progress;

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::channel::PeerChannel;
use crate::common::TransferSettings;
use crate::connection::{ConnectionState, PeerLink};
use crate::transfer::{FileSender, OutgoingFile, ProgressSink};

pub use progress::{ProgressTracker, Transfer, TransferProgress, TransferStatus};

const DISCONNECTED: &str = "peer disconnected";

/// Outcome of [`TransferOrchestrator::send_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
    pub transfers: Vec<Transfer>,
}

pub struct TransferOrchestrator {
    channel: Arc<dyn PeerChannel>,
    state: watch::Receiver<ConnectionState>,
    sender: FileSender,
    tracker: Mutex<Arc<ProgressTracker>>,
}

/// Routes sender callbacks into one file's record.
struct FileProgress<'a> {
    tracker: &'a ProgressTracker,
    index: usize,
}

impl ProgressSink for FileProgress<'_> {
    fn on_progress(&self, percent: f64, bytes_sent: u64) {
        self.tracker.update(self.index, percent, bytes_sent);
    }

    fn on_paused(&self, paused: bool) {
        self.tracker.set_paused(self.index, paused);
    }
}

impl TransferOrchestrator {
    pub fn new(
        channel: Arc<dyn PeerChannel>,
        state: watch::Receiver<ConnectionState>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            sender: FileSender::new(channel.clone(), settings),
            channel,
            state,
            tracker: Mutex::new(Arc::new(ProgressTracker::new())),
        }
    }

    /// Share the link's channel and state. Its event stream stays with the
    /// caller, which runs the receive session.
    pub fn for_link(link: &PeerLink, settings: TransferSettings) -> Self {
        Self::new(link.channel.clone(), link.state.clone(), settings)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.sender = self.sender.with_cancellation(cancel);
        self
    }

    /// Records of the current (or last) batch.
    pub fn tracker(&self) -> Arc<ProgressTracker> {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn link_up(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected && self.channel.is_open()
    }

    /// Send `files` strictly in order.
    ///
    /// A file that errors is marked failed and the batch moves on. If the
    /// link is down before a file starts, it and every later file fail and
    /// the batch stops.
    pub async fn send_batch(&self, files: Vec<OutgoingFile>) -> BatchReport {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.init_files(files.iter().map(|f| (f.name.clone(), f.size())).collect());
        *self.tracker.lock().unwrap_or_else(PoisonError::into_inner) = tracker.clone();

        tracing::info!(files = files.len(), "Starting batch");

        for (index, file) in files.iter().enumerate() {
            if !self.link_up() {
                tracing::warn!(
                    remaining = files.len() - index,
                    "Peer disconnected, failing remaining files"
                );
                for rest in index..files.len() {
                    tracker.fail(rest, DISCONNECTED);
                }
                break;
            }

            tracker.start(index);
            let sink = FileProgress {
                tracker: &tracker,
                index,
            };
            match self.sender.send_file(file, &sink).await {
                Ok(_) => tracker.complete(index),
                Err(e) => {
                    tracing::warn!(name = %file.name, "File failed: {e}");
                    tracker.fail(index, e.to_string());
                }
            }
        }

        let snapshot = tracker.snapshot();
        tracing::info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            "Batch finished"
        );
        BatchReport {
            completed: snapshot.completed,
            failed: snapshot.failed,
            transfers: snapshot.transfers,
        }
    }
}
