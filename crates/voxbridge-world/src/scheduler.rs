//! Per-tick work: send dirty chunks, relight neighbors, flush sub-chunk
//! requests.

use std::sync::Arc;

use voxbridge_lighting::{ChunkLight, LightInput};
use voxbridge_voxel::{ChunkPos, Direction, Palette, SubChunkPos};

use crate::payload::LightPayload;
use crate::remap::remap_chunk;
use crate::store::ChunkStore;
use crate::transport::{
    ChunkWithLight, LightUpdate, LoadBarrier, SubChunkOffset, SubChunkRequest, Transport,
};

/// What one [`ChunkStore::tick`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub chunks_sent: usize,
    pub light_updates_sent: usize,
    /// Relights whose result matched the light already sent.
    pub relights_unchanged: usize,
    pub sub_chunk_batches: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

impl ChunkStore {
    /// Runs one scheduler tick.
    ///
    /// Sub-chunk requests are only flushed once `barrier` reports that the
    /// player has spawned.
    pub fn tick(&mut self, transport: &mut dyn Transport, barrier: &dyn LoadBarrier) -> TickReport {
        let mut report = TickReport::default();

        for _ in 0..self.budgets.chunks_per_tick {
            let Some(pos) = self.dirty.pop() else { break };
            if self.send_chunk(pos, transport) {
                report.chunks_sent += 1;
            }
        }

        for _ in 0..self.budgets.light_updates_per_tick {
            let Some(pos) = self.relight.pop() else { break };
            match self.relight_chunk(pos, transport) {
                Some(true) => report.light_updates_sent += 1,
                Some(false) => report.relights_unchanged += 1,
                None => {}
            }
        }

        if barrier.initially_spawned() {
            report.sub_chunk_batches = self.flush_sub_chunk_requests(transport);
        }

        if !report.is_idle() {
            tracing::debug!(
                chunks_sent = report.chunks_sent,
                light_updates = report.light_updates_sent,
                unchanged = report.relights_unchanged,
                batches = report.sub_chunk_batches,
                dirty = self.dirty.len(),
                relight = self.relight.len(),
                "chunk tick"
            );
        }
        report
    }

    /// Converts and sends `pos` with freshly computed light. Returns
    /// `false` if the column is no longer loaded.
    fn send_chunk(&mut self, pos: ChunkPos, transport: &mut dyn Transport) -> bool {
        let Some(chunk) = self.chunk(pos) else {
            return false;
        };
        let destination = remap_chunk(chunk, self.mappings.as_ref(), self.factory.as_ref(), self.min_y);
        let palettes = destination.block_palettes();
        self.converted.insert(pos, Arc::clone(&palettes));

        let light = self.compute_light(pos, palettes);
        let payload = LightPayload::from_light(&light);
        self.light.insert(pos, Arc::new(light));

        transport.send_chunk_with_light(ChunkWithLight {
            chunk: destination,
            light: payload,
        });
        self.sent.insert(pos);
        tracing::trace!(?pos, "chunk sent");

        for neighbor in pos.neighbors() {
            if self.sent.contains(&neighbor) && self.converted.contains_key(&neighbor) {
                self.relight.push(neighbor);
            }
        }
        true
    }

    /// Recomputes the light of an already sent chunk and sends it if it
    /// changed. `None` if the chunk has nothing cached to relight.
    fn relight_chunk(&mut self, pos: ChunkPos, transport: &mut dyn Transport) -> Option<bool> {
        let sections = Arc::clone(self.converted.get(&pos)?);
        let light = self.compute_light(pos, sections);

        let changed = self.light.get(&pos).is_none_or(|old| light.differs_from(old));
        if changed {
            let payload = LightPayload::from_light(&light);
            self.light.insert(pos, Arc::new(light));
            transport.send_light_update(LightUpdate { pos, light: payload });
        }
        Some(changed)
    }

    fn compute_light(&self, pos: ChunkPos, sections: Arc<[Palette]>) -> ChunkLight {
        let input = LightInput {
            sections,
            neighbor_sections: Direction::ALL.map(|dir| self.converted.get(&pos.neighbor(dir)).cloned()),
            neighbor_light: Direction::ALL.map(|dir| self.light.get(&pos.neighbor(dir)).cloned()),
        };
        self.light_cache.get_or_compute(&input, &self.mappings)
    }

    /// Sends every outstanding request inside the load window, in batches
    /// relative to the render center. Returns the number of batches.
    fn flush_sub_chunk_requests(&mut self, transport: &mut dyn Transport) -> usize {
        let view = self.view;
        self.requests.retain(|p| view.in_load_distance(p.chunk()));

        let base = SubChunkPos::new(view.center.x, 0, view.center.z);
        let batch_size = self.budgets.sub_chunk_batch_size.max(1);
        let mut batches = 0;
        while !self.requests.is_empty() {
            let mut offsets = Vec::with_capacity(batch_size.min(self.requests.len()));
            while offsets.len() < batch_size {
                let Some(pos) = self.requests.pop_first() else { break };
                self.in_flight.insert(pos);
                offsets.push(SubChunkOffset {
                    dx: pos.x - base.x,
                    y: pos.y,
                    dz: pos.z - base.z,
                });
            }
            transport.request_sub_chunks(SubChunkRequest { base, offsets });
            batches += 1;
        }
        batches
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
