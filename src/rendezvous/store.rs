//! In-memory room mailbox keyed by share code.
//!
//! Each room lives in one `DashMap` entry, so every single-room
//! read-modify-write runs under that entry's shard guard. Rooms past their TTL
//! are treated as absent even before the sweeper removes them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

use super::messages::{RoomSnapshot, RoomStatus};
use crate::common::RoomError;

#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub offer: Option<String>,
    pub answer: Option<String>,
    pub offerer_connected: bool,
    pub answerer_connected: bool,
    pub created_at: Instant,
    pub created_at_ms: u64,
}

impl Room {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            offer: None,
            answer: None,
            offerer_connected: true,
            answerer_connected: false,
            created_at: Instant::now(),
            created_at_ms: epoch_millis(),
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    fn status(&self) -> RoomStatus {
        RoomStatus {
            exists: true,
            offerer_connected: self.offerer_connected,
            answerer_connected: self.answerer_connected,
            has_offer: self.offer.is_some(),
            has_answer: self.answer.is_some(),
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            offer: self.offer.clone(),
            answer: self.answer.clone(),
            offerer_connected: self.offerer_connected,
            answerer_connected: self.answerer_connected,
            created_at: self.created_at_ms,
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOutcome {
    /// A live room with this code was replaced.
    pub reset: bool,
}

pub struct RoomStore {
    rooms: DashMap<String, Room>,
    ttl: Duration,
}

impl RoomStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rooms: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert a fresh room, replacing any existing one in a single locked step.
    pub fn create_room(&self, code: &str) -> CreateOutcome {
        let now = Instant::now();
        match self.rooms.entry(code.to_string()) {
            Entry::Occupied(mut entry) => {
                let reset = !entry.get().is_expired(now, self.ttl);
                entry.insert(Room::new(code));
                CreateOutcome { reset }
            }
            Entry::Vacant(entry) => {
                entry.insert(Room::new(code));
                CreateOutcome { reset: false }
            }
        }
    }

    /// Mark the answerer present and hand back whatever offer exists.
    pub fn join_room(&self, code: &str) -> Result<Option<String>, RoomError> {
        self.update(code, |room| {
            room.answerer_connected = true;
            room.offer.clone()
        })
    }

    pub fn submit_offer(&self, code: &str, descriptor: String) -> Result<(), RoomError> {
        self.update(code, |room| room.offer = Some(descriptor))
    }

    pub fn submit_answer(&self, code: &str, descriptor: String) -> Result<(), RoomError> {
        self.update(code, |room| room.answer = Some(descriptor))
    }

    /// `Ok(None)` while no answer has been posted.
    pub fn get_answer(&self, code: &str) -> Result<Option<String>, RoomError> {
        self.read(code, |room| room.answer.clone())
    }

    pub fn check_room(&self, code: &str) -> RoomStatus {
        self.read(code, Room::status).unwrap_or_default()
    }

    pub fn snapshot(&self, code: &str) -> Option<RoomSnapshot> {
        self.read(code, Room::snapshot).ok()
    }

    /// Remove every room older than the TTL. Returns how many were evicted.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.rooms.len();
        self.rooms.retain(|_, room| !room.is_expired(now, self.ttl));
        before.saturating_sub(self.rooms.len())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn update<T>(&self, code: &str, f: impl FnOnce(&mut Room) -> T) -> Result<T, RoomError> {
        let now = Instant::now();
        if let Some(mut room) = self.rooms.get_mut(code) {
            if !room.is_expired(now, self.ttl) {
                return Ok(f(&mut room));
            }
        }
        self.evict_if_expired(code, now);
        Err(RoomError::NotFound)
    }

    fn read<T>(&self, code: &str, f: impl FnOnce(&Room) -> T) -> Result<T, RoomError> {
        let now = Instant::now();
        if let Some(room) = self.rooms.get(code) {
            if !room.is_expired(now, self.ttl) {
                return Ok(f(&room));
            }
        }
        self.evict_if_expired(code, now);
        Err(RoomError::NotFound)
    }

    fn evict_if_expired(&self, code: &str, now: Instant) {
        if self
            .rooms
            .remove_if(code, |_, room| room.is_expired(now, self.ttl))
            .is_some()
        {
            tracing::debug!(code, "evicted expired room on access");
        }
    }
}
