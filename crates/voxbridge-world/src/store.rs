//! Per-connection chunk store.
//!
//! Owns every loaded source chunk inside the view window together with the
//! state derived from it (converted sections, last sent light, dirty and
//! relight queues, sub-chunk requests). All mutation goes through
//! `&mut self`; the only shared piece is the injected [`LightCache`].

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use voxbridge_config::{Config, SchedulerConfig};
use voxbridge_lighting::{ChunkLight, LightCache};
use voxbridge_voxel::{
    BlockEntityFactory, BlockMappings, BlockPos, Chunk, ChunkPos, DESTINATION_AIR,
    DestinationBlockEntity, MAX_LAYERS, Palette, PendingEdit, Section, SourceBlockEntity,
    SubChunkPos,
};

use crate::error::WorldError;
use crate::queue::ChunkQueue;
use crate::remap::destination_state;
use crate::transport::{ObjectAnchor, Transport};

/// Render window around the last center plus the player's own window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewWindow {
    pub center: ChunkPos,
    pub radius: u32,
    /// Chunk the player currently stands in, once known.
    pub player: Option<ChunkPos>,
}

impl ViewWindow {
    pub fn in_render_distance(&self, pos: ChunkPos) -> bool {
        self.center.chebyshev_distance(pos) <= self.radius
    }

    /// The source server may send chunks around the player even when they
    /// fall outside the render window.
    pub fn in_load_distance(&self, pos: ChunkPos) -> bool {
        self.in_render_distance(pos)
            || self
                .player
                .is_some_and(|p| p.chebyshev_distance(pos) <= self.radius)
    }
}

/// Outcome of [`ChunkStore::handle_block_change`].
#[derive(Clone, Debug, PartialEq)]
pub enum BlockChange {
    /// No loaded section holds the position; the change was dropped.
    Unloaded,
    /// The section still waits for its base content; the edit was logged.
    Deferred,
    /// The change named a layer past the overlay; it was dropped.
    InvalidLayer(u8),
    /// The change was applied.
    Applied {
        destination_id: u32,
        block_entity: Option<DestinationBlockEntity>,
    },
}

pub struct ChunkStore {
    pub(crate) min_y: i32,
    pub(crate) height: u32,
    pub(crate) section_count: usize,
    pub(crate) recenter_outside_render: bool,
    pub(crate) budgets: SchedulerConfig,
    pub(crate) view: ViewWindow,
    pub(crate) mappings: Arc<dyn BlockMappings>,
    pub(crate) factory: Arc<dyn BlockEntityFactory>,
    pub(crate) light_cache: Arc<LightCache>,
    pub(crate) chunks: FxHashMap<ChunkPos, Chunk>,
    pub(crate) dirty: ChunkQueue,
    pub(crate) sent: FxHashSet<ChunkPos>,
    /// Destination block palettes of sent chunks, for neighbor lighting.
    pub(crate) converted: FxHashMap<ChunkPos, Arc<[Palette]>>,
    /// Light last sent for each chunk.
    pub(crate) light: FxHashMap<ChunkPos, Arc<ChunkLight>>,
    pub(crate) relight: ChunkQueue,
    pub(crate) requests: BTreeSet<SubChunkPos>,
    pub(crate) in_flight: FxHashSet<SubChunkPos>,
}

impl ChunkStore {
    pub fn new(
        config: &Config,
        mappings: Arc<dyn BlockMappings>,
        factory: Arc<dyn BlockEntityFactory>,
        light_cache: Arc<LightCache>,
    ) -> Self {
        Self {
            min_y: config.world.min_y,
            height: config.world.height,
            section_count: config.world.section_count(),
            recenter_outside_render: config.view.recenter_outside_render,
            budgets: config.scheduler.clone(),
            view: ViewWindow {
                center: ChunkPos::new(0, 0),
                radius: config.view.radius,
                player: None,
            },
            mappings,
            factory,
            light_cache,
            chunks: FxHashMap::default(),
            dirty: ChunkQueue::new(),
            sent: FxHashSet::default(),
            converted: FxHashMap::default(),
            light: FxHashMap::default(),
            relight: ChunkQueue::new(),
            requests: BTreeSet::new(),
            in_flight: FxHashSet::default(),
        }
    }

    // --- Window ---

    pub fn view(&self) -> ViewWindow {
        self.view
    }

    pub fn is_in_render_distance(&self, pos: ChunkPos) -> bool {
        self.view.in_render_distance(pos)
    }

    pub fn is_in_load_distance(&self, pos: ChunkPos) -> bool {
        self.view.in_load_distance(pos)
    }

    /// Moves the render window and unloads chunks that left the load window.
    pub fn set_center(&mut self, x: i32, z: i32, transport: &mut dyn Transport) {
        self.view.center = ChunkPos::new(x, z);
        self.remove_out_of_load_distance(transport);
    }

    pub fn set_radius(&mut self, radius: u32, transport: &mut dyn Transport) {
        self.view.radius = radius;
        self.remove_out_of_load_distance(transport);
    }

    /// Records the player's block position. Does not unload anything.
    pub fn set_player_position(&mut self, x: f64, z: f64) {
        self.view.player = Some(ChunkPos::containing_point(x, z));
    }

    fn remove_out_of_load_distance(&mut self, transport: &mut dyn Transport) {
        let view = self.view;
        let mut outside: Vec<ChunkPos> = self
            .chunks
            .keys()
            .copied()
            .filter(|&pos| !view.in_load_distance(pos))
            .collect();
        outside.sort_unstable();
        for pos in outside {
            self.unload_chunk(pos, transport);
        }
    }

    // --- Chunk lifecycle ---

    /// Starts a new column with `declared_non_empty` sections present and
    /// the rest awaiting sub-chunk data.
    ///
    /// Returns `None` outside the load window.
    pub fn create_chunk(
        &mut self,
        pos: ChunkPos,
        declared_non_empty: usize,
        transport: &mut dyn Transport,
    ) -> Option<&mut Chunk> {
        if !self.view.in_load_distance(pos) {
            tracing::debug!(?pos, "chunk outside load distance ignored");
            return None;
        }
        if !self.view.in_render_distance(pos) {
            tracing::warn!(?pos, "received chunk outside of render distance, but within load distance");
            if self.recenter_outside_render
                && let Some(player) = self.view.player
            {
                transport.set_view_center(player);
            }
        }

        self.forget_derived(pos);
        let chunk = Chunk::new(pos, self.section_count, declared_non_empty);
        self.chunks.insert(pos, chunk);
        self.chunks.get_mut(&pos)
    }

    /// Drops a chunk and everything derived from it.
    pub fn unload_chunk(&mut self, pos: ChunkPos, transport: &mut dyn Transport) -> Option<Chunk> {
        let chunk = self.chunks.remove(&pos)?;
        self.forget_derived(pos);
        transport.detach_objects(ObjectAnchor::Chunk(pos));
        transport.forget_chunk(pos);
        tracing::trace!(?pos, "chunk unloaded");
        Some(chunk)
    }

    fn forget_derived(&mut self, pos: ChunkPos) {
        self.sent.remove(&pos);
        self.converted.remove(&pos);
        self.light.remove(&pos);
        self.relight.remove(pos);
        self.dirty.remove(pos);
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        if !self.view.in_load_distance(pos) {
            return None;
        }
        self.chunks.get(&pos)
    }

    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        if !self.view.in_load_distance(pos) {
            return None;
        }
        self.chunks.get_mut(&pos)
    }

    pub fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.chunk(pos).is_some()
    }

    /// Queues `pos` for conversion and sending on the next tick.
    pub fn send_chunk_next_tick(&mut self, pos: ChunkPos) {
        self.dirty.push(pos);
    }

    pub fn is_dirty(&self, pos: ChunkPos) -> bool {
        self.dirty.contains(pos)
    }

    pub fn is_sent(&self, pos: ChunkPos) -> bool {
        self.sent.contains(&pos)
    }

    /// Light last sent for `pos`.
    pub fn sent_light(&self, pos: ChunkPos) -> Option<&ChunkLight> {
        self.light.get(&pos).map(Arc::as_ref)
    }

    // --- Sections ---

    fn slot(&self, section_y: i32) -> Option<usize> {
        let slot = section_y - (self.min_y >> 4);
        usize::try_from(slot).ok().filter(|&s| s < self.section_count)
    }

    pub fn section(&self, pos: SubChunkPos) -> Option<&Section> {
        let slot = self.slot(pos.y)?;
        self.chunk(pos.chunk())?.section(slot)
    }

    fn section_mut(&mut self, pos: SubChunkPos) -> Option<&mut Section> {
        let slot = self.slot(pos.y)?;
        self.chunk_mut(pos.chunk())?.section_mut(slot)
    }

    /// Queues one sub-chunk for the next request flush. Ignored outside the
    /// load window.
    pub fn request_sub_chunk(&mut self, pos: SubChunkPos) -> bool {
        if !self.view.in_load_distance(pos.chunk()) {
            return false;
        }
        self.requests.insert(pos)
    }

    /// Queues sub-chunks `from..to` of the column at `pos`.
    pub fn request_sub_chunks(&mut self, pos: ChunkPos, from: i32, to: i32) {
        for y in from..to {
            self.request_sub_chunk(SubChunkPos::new(pos.x, y, pos.z));
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn is_in_flight(&self, pos: SubChunkPos) -> bool {
        self.in_flight.contains(&pos)
    }

    /// Installs the content of a requested sub-chunk.
    ///
    /// The slot's layers are replaced, buffered edits are replayed on top
    /// and `block_entities` replace records at the same positions. The
    /// column is queued for sending. Sections with more than two layers or
    /// wrongly sized palettes are rejected without touching the column.
    pub fn merge_sub_chunk(
        &mut self,
        pos: SubChunkPos,
        mut section: Section,
        block_entities: Vec<SourceBlockEntity>,
    ) -> Result<(), WorldError> {
        if !self.in_flight.remove(&pos) {
            tracing::warn!(?pos, "received sub chunk that was not requested");
            return Err(WorldError::NotRequested(pos));
        }
        if self.chunk(pos.chunk()).is_none() {
            tracing::warn!(?pos, "received sub chunk for unloaded chunk");
            return Err(WorldError::ChunkNotLoaded(pos));
        }
        let Some(slot) = self.slot(pos.y) else {
            tracing::warn!(?pos, "received sub chunk outside of the world height");
            return Err(WorldError::SectionOutOfRange(pos));
        };

        if let Err(e) = section.check_shape() {
            tracing::warn!(?pos, error = %e, "received malformed sub chunk");
            return Err(WorldError::MalformedSection(pos, e));
        }

        self.normalize_section(&mut section);
        let air = self.mappings.source_air_id();
        let chunk = self
            .chunks
            .get_mut(&pos.chunk())
            .ok_or(WorldError::ChunkNotLoaded(pos))?;
        let target = chunk
            .section_mut(slot)
            .ok_or(WorldError::SectionOutOfRange(pos))?;
        target.merge_from(section);
        let replayed = target.apply_pending(air);
        for entity in block_entities {
            chunk.put_block_entity(entity);
        }
        tracing::trace!(?pos, replayed, "sub chunk merged");

        self.dirty.push(pos.chunk());
        Ok(())
    }

    /// Resolves legacy and persistent ids in every block layer to runtime
    /// ids. Unknown ids become the replacement id.
    pub fn normalize_section(&self, section: &mut Section) {
        let mappings = self.mappings.as_ref();
        for layer in section.layers_mut() {
            layer.remap_ids(|id| {
                mappings.normalize_source_id(id).unwrap_or_else(|| {
                    tracing::warn!(id, "missing source block state");
                    mappings.replacement_id()
                })
            });
        }
    }

    /// Applies a single source block change.
    pub fn handle_block_change(
        &mut self,
        pos: BlockPos,
        layer: u8,
        source_id: u32,
        transport: &mut dyn Transport,
    ) -> BlockChange {
        if layer as usize >= MAX_LAYERS {
            tracing::warn!(?pos, layer, "block change for unsupported layer");
            return BlockChange::InvalidLayer(layer);
        }
        let mappings = Arc::clone(&self.mappings);
        let factory = Arc::clone(&self.factory);
        let air = mappings.source_air_id();
        let (x, y, z) = pos.local();

        let Some(section) = self.section_mut(pos.sub_chunk()) else {
            return BlockChange::Unloaded;
        };
        if section.is_awaiting_fill() {
            section.buffer_edit(PendingEdit {
                x: x as u8,
                y: y as u8,
                z: z as u8,
                layer,
                id: source_id,
            });
            return BlockChange::Deferred;
        }

        let Some(palette) = section.ensure_layer(layer as usize, air) else {
            return BlockChange::InvalidLayer(layer);
        };
        let previous = palette.id_at(x, y, z);
        palette.set_id_at(x, y, z, source_id);
        let mut destination_id = destination_state(mappings.as_ref(), section, x, y, z);

        let previous_tag = mappings.tag(previous);
        let tag = mappings.tag(source_id);
        let Some(chunk) = self.chunks.get_mut(&pos.chunk()) else {
            return BlockChange::Unloaded;
        };
        if previous_tag != tag {
            chunk.remove_block_entity_at(pos);
            transport.detach_objects(ObjectAnchor::Block(pos));
        }

        let mut block_entity = None;
        if previous != source_id
            && let Some(tag) = tag
            && factory.is_destination_block_entity(tag)
        {
            let constructed = match chunk.block_entity_at(pos) {
                Some(record) => factory.convert(source_id, record).inspect(|converted| {
                    if let Some(state) = converted.block_state_override {
                        destination_id = state;
                    }
                }),
                None => mappings
                    .block_entity_type(tag)
                    .map(|type_id| DestinationBlockEntity::empty(pos, type_id)),
            };
            block_entity = constructed.filter(DestinationBlockEntity::has_data);
        }

        BlockChange::Applied {
            destination_id,
            block_entity,
        }
    }

    // --- Queries ---

    /// Source id at `pos` in `layer`; source air for anything missing.
    pub fn block_state(&self, layer: usize, pos: BlockPos) -> u32 {
        let (x, y, z) = pos.local();
        self.section(pos.sub_chunk())
            .and_then(|s| s.block_at(layer, x, y, z))
            .unwrap_or_else(|| self.mappings.source_air_id())
    }

    /// Destination state at `pos` with overlay waterlogging applied.
    pub fn destination_block_state(&self, pos: BlockPos) -> u32 {
        let (x, y, z) = pos.local();
        match self.section(pos.sub_chunk()) {
            Some(section) => destination_state(self.mappings.as_ref(), section, x, y, z),
            None => DESTINATION_AIR,
        }
    }

    pub fn block_entity(&self, pos: BlockPos) -> Option<&SourceBlockEntity> {
        self.chunk(pos.chunk())?.block_entity_at(pos)
    }

    /// Stores `entity`, replacing any record at its position. Dropped when
    /// the column is not loaded.
    pub fn add_block_entity(&mut self, entity: SourceBlockEntity) {
        if let Some(chunk) = self.chunk_mut(entity.position.chunk()) {
            chunk.put_block_entity(entity);
        }
    }

    /// Whether `pos` lies somewhere the client cannot see real blocks yet:
    /// an unloaded column, a section awaiting its base fill or a column
    /// queued for sending.
    pub fn is_in_unloaded_section(&self, pos: BlockPos) -> bool {
        let chunk_pos = pos.chunk();
        if !self.is_chunk_loaded(chunk_pos) {
            return true;
        }
        let Some(section) = self.section(pos.sub_chunk()) else {
            return false;
        };
        section.is_awaiting_fill() || self.dirty.contains(chunk_pos)
    }

    /// No chunks and no outstanding sub-chunk requests.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.requests.is_empty() && self.in_flight.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn max_y(&self) -> i32 {
        self.height as i32 - self.min_y.abs()
    }

    pub fn world_height(&self) -> u32 {
        self.height
    }

    pub fn section_count(&self) -> usize {
        self.section_count
    }

    pub fn light_cache(&self) -> &Arc<LightCache> {
        &self.light_cache
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
