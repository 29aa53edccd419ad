//! Id-space mappings between the source and destination protocols.
//!
//! The translation only ever talks to the capability traits
//! [`BlockMappings`], [`LightProperties`] and [`BlockEntityFactory`]; the
//! authoritative tables live outside this workspace. [`MappingTable`] is an
//! in-memory implementation built through a small registration API.

use rustc_hash::FxHashMap;

use crate::block_entity::{DestinationBlockEntity, SourceBlockEntity};
use crate::error::MappingError;

/// Destination block state id of air.
pub const DESTINATION_AIR: u32 = 0;

/// Tag carried by water source states; an overlay layer holding one of
/// these waterlogs the primary block.
pub const WATER_TAG: &str = "water";

/// Light behaviour of destination block states.
pub trait LightProperties {
    /// How much light is lost when passing through `id` (0..=15).
    fn filter_light(&self, id: u32) -> u8;
    /// Light level emitted by `id` (0..=15).
    fn emit_light(&self, id: u32) -> u8;
}

/// Source → destination block and biome mappings.
pub trait BlockMappings: LightProperties + Send + Sync {
    /// Source runtime id of air.
    fn source_air_id(&self) -> u32;

    /// Source id substituted for ids the mapping does not know.
    fn replacement_id(&self) -> u32;

    /// Resolves a legacy or persistent source id to the runtime id space.
    /// `None` when the id is unknown.
    fn normalize_source_id(&self, id: u32) -> Option<u32>;

    /// Destination block state for a source runtime id.
    fn destination_id(&self, source: u32) -> Option<u32>;

    /// Tag of a source runtime id, if it has one.
    fn tag(&self, source: u32) -> Option<&str>;

    /// Waterlogged variant of a destination state.
    fn waterlogged(&self, destination: u32) -> Option<u32>;

    /// Destination biome for a source biome id.
    fn destination_biome(&self, source: u32) -> Option<u32>;

    /// Destination biome used when a source biome is unknown.
    fn fallback_biome(&self) -> u32;

    /// Destination block-entity type registered for `tag`.
    fn block_entity_type(&self, tag: &str) -> Option<i32>;

    /// Whether a destination state blocks motion (for heightmaps).
    fn is_motion_blocking(&self, destination: u32) -> bool;
}

/// Builds destination block entities from source records.
pub trait BlockEntityFactory: Send + Sync {
    /// Whether blocks with `tag` own a destination block entity.
    fn is_destination_block_entity(&self, tag: &str) -> bool;

    /// Converts a stored source record for the block `source_id`.
    fn convert(&self, source_id: u32, entity: &SourceBlockEntity) -> Option<DestinationBlockEntity>;
}

/// Light and shape properties of one destination state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestinationBlock {
    pub filter_light: u8,
    pub emit_light: u8,
    pub motion_blocking: bool,
    pub waterlogged: Option<u32>,
}

impl DestinationBlock {
    /// A solid, light-blocking state.
    pub fn opaque() -> Self {
        Self {
            filter_light: 15,
            emit_light: 0,
            motion_blocking: true,
            waterlogged: None,
        }
    }

    /// A non-blocking state that emits `level`.
    pub fn emitter(level: u8) -> Self {
        Self {
            emit_light: level.min(15),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
struct SourceBlock {
    destination: u32,
    tag: Option<String>,
}

/// In-memory mapping tables.
///
/// Destination air (`0`) is pre-registered as a transparent, non-blocking
/// state. Destination ids that were never defined behave like air for
/// lighting and heightmaps.
#[derive(Clone, Debug)]
pub struct MappingTable {
    source_air: u32,
    replacement: u32,
    blocks: FxHashMap<u32, SourceBlock>,
    legacy: FxHashMap<u32, u32>,
    destinations: FxHashMap<u32, DestinationBlock>,
    biomes: FxHashMap<u32, u32>,
    fallback_biome: u32,
    block_entity_types: FxHashMap<String, i32>,
    block_entity_states: FxHashMap<String, u32>,
}

impl MappingTable {
    /// Creates a table whose source air maps to destination air.
    ///
    /// `replacement` is the source id substituted for unknown ids; it should
    /// be mapped like any other block.
    pub fn new(source_air: u32, replacement: u32) -> Self {
        let mut blocks = FxHashMap::default();
        blocks.insert(
            source_air,
            SourceBlock {
                destination: DESTINATION_AIR,
                tag: None,
            },
        );
        let mut destinations = FxHashMap::default();
        destinations.insert(DESTINATION_AIR, DestinationBlock::default());
        Self {
            source_air,
            replacement,
            blocks,
            legacy: FxHashMap::default(),
            destinations,
            biomes: FxHashMap::default(),
            fallback_biome: 0,
            block_entity_types: FxHashMap::default(),
            block_entity_states: FxHashMap::default(),
        }
    }

    /// Maps a source runtime id to a destination state, optionally tagged.
    pub fn map_block(&mut self, source: u32, destination: u32, tag: Option<&str>) -> Result<(), MappingError> {
        if self.blocks.contains_key(&source) {
            return Err(MappingError::DuplicateSource(source));
        }
        self.blocks.insert(
            source,
            SourceBlock {
                destination,
                tag: tag.map(str::to_owned),
            },
        );
        Ok(())
    }

    /// Defines the properties of a destination state.
    pub fn define_destination(&mut self, id: u32, block: DestinationBlock) -> Result<(), MappingError> {
        if id != DESTINATION_AIR && self.destinations.contains_key(&id) {
            return Err(MappingError::DuplicateDestination(id));
        }
        self.destinations.insert(id, block);
        Ok(())
    }

    /// Aliases a legacy or persistent id to a runtime id.
    pub fn alias_legacy(&mut self, legacy: u32, runtime: u32) -> Result<(), MappingError> {
        if self.legacy.contains_key(&legacy) {
            return Err(MappingError::DuplicateLegacy(legacy));
        }
        self.legacy.insert(legacy, runtime);
        Ok(())
    }

    pub fn map_biome(&mut self, source: u32, destination: u32) -> Result<(), MappingError> {
        if self.biomes.contains_key(&source) {
            return Err(MappingError::DuplicateBiome(source));
        }
        self.biomes.insert(source, destination);
        Ok(())
    }

    pub fn set_fallback_biome(&mut self, biome: u32) {
        self.fallback_biome = biome;
    }

    /// Registers the destination block-entity type owned by blocks tagged `tag`.
    pub fn register_block_entity(&mut self, tag: &str, type_id: i32) {
        self.block_entity_types.insert(tag.to_owned(), type_id);
    }

    /// Makes converted block entities for `tag` override the block state
    /// with `state`.
    pub fn override_block_entity_state(&mut self, tag: &str, state: u32) {
        self.block_entity_states.insert(tag.to_owned(), state);
    }

    fn destination(&self, id: u32) -> DestinationBlock {
        self.destinations.get(&id).copied().unwrap_or_default()
    }
}

impl LightProperties for MappingTable {
    fn filter_light(&self, id: u32) -> u8 {
        self.destination(id).filter_light
    }

    fn emit_light(&self, id: u32) -> u8 {
        self.destination(id).emit_light
    }
}

impl BlockMappings for MappingTable {
    fn source_air_id(&self) -> u32 {
        self.source_air
    }

    fn replacement_id(&self) -> u32 {
        self.replacement
    }

    fn normalize_source_id(&self, id: u32) -> Option<u32> {
        if self.blocks.contains_key(&id) {
            Some(id)
        } else {
            self.legacy.get(&id).copied()
        }
    }

    fn destination_id(&self, source: u32) -> Option<u32> {
        self.blocks.get(&source).map(|b| b.destination)
    }

    fn tag(&self, source: u32) -> Option<&str> {
        self.blocks.get(&source).and_then(|b| b.tag.as_deref())
    }

    fn waterlogged(&self, destination: u32) -> Option<u32> {
        self.destinations.get(&destination).and_then(|d| d.waterlogged)
    }

    fn destination_biome(&self, source: u32) -> Option<u32> {
        self.biomes.get(&source).copied()
    }

    fn fallback_biome(&self) -> u32 {
        self.fallback_biome
    }

    fn block_entity_type(&self, tag: &str) -> Option<i32> {
        self.block_entity_types.get(tag).copied()
    }

    fn is_motion_blocking(&self, destination: u32) -> bool {
        self.destination(destination).motion_blocking
    }
}

impl BlockEntityFactory for MappingTable {
    fn is_destination_block_entity(&self, tag: &str) -> bool {
        self.block_entity_types.contains_key(tag)
    }

    fn convert(&self, source_id: u32, entity: &SourceBlockEntity) -> Option<DestinationBlockEntity> {
        let tag = self.tag(source_id)?;
        let type_id = self.block_entity_type(tag)?;
        let mut out = DestinationBlockEntity::empty(entity.position, type_id);
        out.data = entity.data.clone();
        out.block_state_override = self.block_entity_states.get(tag).copied();
        Some(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
