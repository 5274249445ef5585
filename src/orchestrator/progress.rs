//! Lock-free per-file transfer records for a batch.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum TransferStatus {
    Pending,
    Transferring,
    /// Waiting for the send buffer to drain.
    Paused,
    Completed,
    Failed(String),
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed(_))
    }
}

/// One file's record as shown to a UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    /// 0..=100
    pub progress: f64,
    pub speed_bytes_per_sec: f64,
    pub status: TransferStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferProgress {
    pub transfers: Vec<Transfer>,
    pub completed: usize,
    pub failed: usize,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.completed + self.failed == self.transfers.len()
    }
}

const PENDING: u8 = 0;
const TRANSFERRING: u8 = 1;
const PAUSED: u8 = 2;
const COMPLETED: u8 = 3;
const FAILED: u8 = 4;

struct FileState {
    id: String,
    name: String,
    size: u64,
    status: AtomicU8,
    progress_bits: AtomicU64,
    bytes_sent: AtomicU64,
    started: OnceLock<Instant>,
    finished_speed_bits: AtomicU64,
    error: Mutex<Option<String>>,
}

impl FileState {
    fn progress(&self) -> f64 {
        f64::from_bits(self.progress_bits.load(Ordering::Relaxed))
    }

    fn speed(&self) -> f64 {
        let Some(started) = self.started.get() else {
            return 0.0;
        };
        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_sent.load(Ordering::Relaxed) as f64 / elapsed
    }

    /// Move into a terminal state once. Later calls are no-ops.
    fn finish(&self, terminal: u8) -> bool {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            if current == COMPLETED || current == FAILED {
                return false;
            }
            match self.status.compare_exchange(
                current,
                terminal,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Per-file records are set once via `init_files()` (backed by OnceLock);
/// every update afterwards is atomic.
pub struct ProgressTracker {
    files: OnceLock<Vec<FileState>>,
    files_completed: AtomicU64,
    files_failed: AtomicU64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            files: OnceLock::new(),
            files_completed: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
        }
    }

    /// Register `(name, size)` per file, all `pending`. Only the first call
    /// takes effect.
    pub fn init_files(&self, files: Vec<(String, u64)>) {
        let states = files
            .into_iter()
            .map(|(name, size)| FileState {
                id: Uuid::new_v4().to_string(),
                name,
                size,
                status: AtomicU8::new(PENDING),
                progress_bits: AtomicU64::new(0f64.to_bits()),
                bytes_sent: AtomicU64::new(0),
                started: OnceLock::new(),
                finished_speed_bits: AtomicU64::new(0f64.to_bits()),
                error: Mutex::new(None),
            })
            .collect();
        let _ = self.files.set(states);
    }

    fn file(&self, index: usize) -> Option<&FileState> {
        self.files.get().and_then(|files| files.get(index))
    }

    pub fn start(&self, index: usize) {
        if let Some(fs) = self.file(index) {
            let _ = fs.started.set(Instant::now());
            let _ = fs.status.compare_exchange(
                PENDING,
                TRANSFERRING,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    pub fn update(&self, index: usize, percent: f64, bytes_sent: u64) {
        if let Some(fs) = self.file(index) {
            fs.progress_bits
                .store(percent.clamp(0.0, 100.0).to_bits(), Ordering::Relaxed);
            fs.bytes_sent.store(bytes_sent, Ordering::Relaxed);
        }
    }

    /// Toggle between `transferring` and `paused`. Ignored in other states.
    pub fn set_paused(&self, index: usize, paused: bool) {
        if let Some(fs) = self.file(index) {
            let (from, to) = if paused {
                (TRANSFERRING, PAUSED)
            } else {
                (PAUSED, TRANSFERRING)
            };
            let _ = fs
                .status
                .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire);
        }
    }

    /// Idempotent; a failed file stays failed.
    pub fn complete(&self, index: usize) {
        if let Some(fs) = self.file(index) {
            let speed = fs.speed();
            if fs.finish(COMPLETED) {
                fs.progress_bits.store(100f64.to_bits(), Ordering::Relaxed);
                fs.finished_speed_bits.store(speed.to_bits(), Ordering::Relaxed);
                self.files_completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Idempotent; a completed file stays completed.
    pub fn fail(&self, index: usize, reason: impl Into<String>) {
        if let Some(fs) = self.file(index) {
            if fs.finish(FAILED) {
                *fs.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
                self.files_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> TransferProgress {
        let Some(files) = self.files.get() else {
            return TransferProgress::default();
        };

        let transfers = files
            .iter()
            .map(|fs| {
                let status = match fs.status.load(Ordering::Acquire) {
                    TRANSFERRING => TransferStatus::Transferring,
                    PAUSED => TransferStatus::Paused,
                    COMPLETED => TransferStatus::Completed,
                    FAILED => TransferStatus::Failed(
                        fs.error
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .clone()
                            .unwrap_or_default(),
                    ),
                    _ => TransferStatus::Pending,
                };
                let speed_bytes_per_sec = match status {
                    TransferStatus::Transferring | TransferStatus::Paused => fs.speed(),
                    TransferStatus::Completed => {
                        f64::from_bits(fs.finished_speed_bits.load(Ordering::Relaxed))
                    }
                    _ => 0.0,
                };

                Transfer {
                    id: fs.id.clone(),
                    file_name: fs.name.clone(),
                    file_size: fs.size,
                    progress: fs.progress(),
                    speed_bytes_per_sec,
                    status,
                }
            })
            .collect();

        TransferProgress {
            transfers,
            completed: self.files_completed.load(Ordering::Relaxed) as usize,
            failed: self.files_failed.load(Ordering::Relaxed) as usize,
        }
    }
}
