//! First-in first-out chunk queue with a dedup guard.
//!
//! Used for both the dirty queue and the pending-relight queue: a chunk is
//! queued at most once, and removal by position is O(1). Entries carry the
//! generation they were queued with, so a chunk removed and queued again
//! pops at its new place in line and its old entry is skipped.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use voxbridge_voxel::ChunkPos;

#[derive(Debug, Default)]
pub struct ChunkQueue {
    order: VecDeque<(i64, u64)>,
    /// Live generation per queued chunk key.
    pending: FxHashMap<i64, u64>,
    next_generation: u64,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `pos` unless it is already waiting. Returns whether it was added.
    pub fn push(&mut self, pos: ChunkPos) -> bool {
        let key = pos.key();
        if self.pending.contains_key(&key) {
            return false;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending.insert(key, generation);
        self.order.push_back((key, generation));
        true
    }

    /// Oldest waiting position.
    pub fn pop(&mut self) -> Option<ChunkPos> {
        while let Some((key, generation)) = self.order.pop_front() {
            if self.pending.get(&key) == Some(&generation) {
                self.pending.remove(&key);
                return Some(ChunkPos::from_key(key));
            }
        }
        None
    }

    /// Drops `pos` from the queue. Returns whether it was waiting.
    pub fn remove(&mut self, pos: ChunkPos) -> bool {
        self.pending.remove(&pos.key()).is_some()
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.pending.contains_key(&pos.key())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
