//! Conversion of source chunks into the destination representation.
//!
//! Layer 0 is copied and remapped palette entry by palette entry, tagged
//! cells get destination block entities, a water overlay waterlogs the
//! primary block, 16³ biomes are downsampled to 4³ by majority and two
//! heightmaps are derived from the result.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use voxbridge_voxel::{
    BlockEntityFactory, BlockMappings, BlockPos, Chunk, ChunkPos, DESTINATION_AIR,
    DestinationBlockEntity, Palette, Section, WATER_TAG,
};

/// One converted section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationSection {
    pub blocks: Palette,
    pub biomes: Palette,
    /// Number of cells whose destination id is not air.
    pub non_air: u16,
}

/// Per-column surface heights, indexed `(z << 4) | x`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Heightmaps {
    pub world_surface: Vec<i32>,
    pub motion_blocking: Vec<i32>,
    /// Bits per entry when packed (`ceil(log2(world_height + 1))`).
    pub bits_per_entry: u8,
}

/// A fully converted chunk column.
#[derive(Clone, Debug, PartialEq)]
pub struct DestinationChunk {
    pub pos: ChunkPos,
    pub sections: Vec<DestinationSection>,
    pub heightmaps: Heightmaps,
    pub block_entities: Vec<DestinationBlockEntity>,
}

impl DestinationChunk {
    /// Block palettes of every section, bottom to top.
    pub fn block_palettes(&self) -> Arc<[Palette]> {
        self.sections.iter().map(|s| s.blocks.clone()).collect()
    }
}

/// Destination state of the cell at section-local `(x, y, z)`, with the
/// overlay layer's waterlogging applied.
pub fn destination_state(mappings: &dyn BlockMappings, section: &Section, x: usize, y: usize, z: usize) -> u32 {
    let air = mappings.source_air_id();
    let source = section.block_at(0, x, y, z).unwrap_or(air);
    let mut state = match mappings.destination_id(source) {
        Some(id) => id,
        None => {
            tracing::warn!(source, "missing block state mapping");
            DESTINATION_AIR
        }
    };

    if source != air
        && let Some(overlay) = section.block_at(1, x, y, z)
        && mappings.tag(overlay) == Some(WATER_TAG)
    {
        match mappings.waterlogged(state) {
            Some(waterlogged) => state = waterlogged,
            None => tracing::warn!(state, "missing waterlogged block state"),
        }
    }
    state
}

/// Converts `chunk` for a world whose lowest block is at `min_y`.
pub fn remap_chunk(
    chunk: &Chunk,
    mappings: &dyn BlockMappings,
    factory: &dyn BlockEntityFactory,
    min_y: i32,
) -> DestinationChunk {
    let mut block_entities = Vec::new();
    let sections = chunk
        .sections()
        .iter()
        .enumerate()
        .map(|(idx, section)| {
            let (blocks, non_air) = match section.layer(0) {
                Some(layer0) => {
                    let base_y = min_y + (idx as i32) * 16;
                    remap_blocks(chunk, section, layer0, base_y, mappings, factory, &mut block_entities)
                }
                None => (Palette::blocks(DESTINATION_AIR), 0),
            };
            DestinationSection {
                blocks,
                biomes: remap_biomes(section.biomes(), mappings),
                non_air,
            }
        })
        .collect::<Vec<_>>();

    let world_height = (sections.len() * 16) as u32;
    let heightmaps = compute_heightmaps(&sections, mappings, min_y, world_height);

    DestinationChunk {
        pos: chunk.pos(),
        sections,
        heightmaps,
        block_entities,
    }
}

fn remap_blocks(
    chunk: &Chunk,
    section: &Section,
    layer0: &Palette,
    base_y: i32,
    mappings: &dyn BlockMappings,
    factory: &dyn BlockEntityFactory,
    block_entities: &mut Vec<DestinationBlockEntity>,
) -> (Palette, u16) {
    let mut blocks = layer0.clone();
    let tags: Vec<Option<&str>> = layer0.ids().iter().map(|&id| mappings.tag(id)).collect();
    blocks.remap_ids(|source| match mappings.destination_id(source) {
        Some(id) => id,
        None => {
            tracing::warn!(source, "missing block state mapping");
            DESTINATION_AIR
        }
    });

    let origin = chunk.pos();
    let mut non_air = 0u16;
    for x in 0..16 {
        for z in 0..16 {
            for y in 0..16 {
                let index = blocks.index_at(x, y, z) as usize;
                if blocks.id_by_index(index).is_some_and(|id| id != DESTINATION_AIR) {
                    non_air += 1;
                }

                let Some(tag) = tags.get(index).copied().flatten() else {
                    continue;
                };
                if !factory.is_destination_block_entity(tag) {
                    continue;
                }
                let pos = BlockPos::new(origin.x * 16 + x as i32, base_y + y as i32, origin.z * 16 + z as i32);
                match chunk.block_entity_at(pos) {
                    Some(source) => {
                        if let Some(converted) = factory.convert(layer0.id_at(x, y, z), source) {
                            if let Some(state) = converted.block_state_override {
                                blocks.set_id_at(x, y, z, state);
                            }
                            if converted.has_data() {
                                block_entities.push(converted);
                            }
                        }
                    }
                    None => {
                        if let Some(type_id) = mappings.block_entity_type(tag) {
                            block_entities.push(DestinationBlockEntity::empty(pos, type_id));
                        }
                    }
                }
            }
        }
    }

    if let Some(overlay) = section.layer(1) {
        waterlog(&mut blocks, layer0, overlay, mappings);
    }
    (blocks, non_air)
}

fn waterlog(blocks: &mut Palette, layer0: &Palette, overlay: &Palette, mappings: &dyn BlockMappings) {
    let air = mappings.source_air_id();
    if overlay.single_id() == Some(air) {
        return;
    }
    for x in 0..16 {
        for z in 0..16 {
            for y in 0..16 {
                let primary = layer0.id_at(x, y, z);
                if primary == air {
                    continue;
                }
                let second = overlay.id_at(x, y, z);
                if second == air {
                    continue;
                }
                if mappings.tag(second) == Some(WATER_TAG) {
                    match mappings.waterlogged(blocks.id_at(x, y, z)) {
                        Some(state) => blocks.set_id_at(x, y, z, state),
                        None => tracing::warn!(primary, "missing waterlogged block state"),
                    }
                } else {
                    tracing::warn!(primary, second, "overlay layer holds a non-water block");
                }
            }
        }
    }
}

/// Downsamples a 16³ source biome palette to 4³ (most frequent id per 4³
/// cell, first to reach the maximum wins) and remaps it.
fn remap_biomes(source: Option<&Palette>, mappings: &dyn BlockMappings) -> Palette {
    let Some(source) = source else {
        return Palette::biomes(mappings.fallback_biome());
    };

    let mut biomes = match source.single_id() {
        Some(id) => Palette::biomes(id),
        None if source.edge() == 4 => source.clone(),
        None => {
            let mut out = Palette::biomes(source.id_at(0, 0, 0));
            let mut counts: FxHashMap<u32, u32> = FxHashMap::default();
            for x in 0..4 {
                for z in 0..4 {
                    for y in 0..4 {
                        counts.clear();
                        let (mut best, mut best_count) = (0, 0);
                        for sx in 0..4 {
                            for sz in 0..4 {
                                for sy in 0..4 {
                                    let id = source.id_at(x * 4 + sx, y * 4 + sy, z * 4 + sz);
                                    let count = counts.entry(id).or_insert(0);
                                    *count += 1;
                                    if *count > best_count {
                                        best = id;
                                        best_count = *count;
                                    }
                                }
                            }
                        }
                        out.set_id_at(x, y, z, best);
                    }
                }
            }
            out
        }
    };

    biomes.remap_ids(|source| match mappings.destination_biome(source) {
        Some(id) => id,
        None => {
            tracing::warn!(source, "missing biome mapping");
            mappings.fallback_biome()
        }
    });
    biomes
}

fn compute_heightmaps(
    sections: &[DestinationSection],
    mappings: &dyn BlockMappings,
    min_y: i32,
    world_height: u32,
) -> Heightmaps {
    let mut world_surface = vec![min_y; 256];
    let mut motion_blocking = vec![min_y; 256];

    for z in 0..16 {
        for x in 0..16 {
            let col = (z << 4) | x;
            let mut surface_found = false;
            'column: for (idx, section) in sections.iter().enumerate().rev() {
                if section.blocks.single_id() == Some(DESTINATION_AIR) {
                    continue;
                }
                for y in (0..16).rev() {
                    let id = section.blocks.id_at(x, y, z);
                    if id == DESTINATION_AIR {
                        continue;
                    }
                    let height = (idx * 16 + y + 1) as i32;
                    if !surface_found {
                        world_surface[col] = height;
                        surface_found = true;
                    }
                    if mappings.is_motion_blocking(id) {
                        motion_blocking[col] = height;
                        break 'column;
                    }
                }
            }
        }
    }

    Heightmaps {
        world_surface,
        motion_blocking,
        bits_per_entry: bits_for(world_height + 1),
    }
}

/// `ceil(log2(n))`.
fn bits_for(n: u32) -> u8 {
    (u32::BITS - n.saturating_sub(1).leading_zeros()) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use voxbridge_voxel::{DestinationBlock, MappingTable, SourceBlockEntity};

    use super::*;

    const AIR: u32 = 100;
    const STONE: u32 = 101;
    const WATER: u32 = 102;
    const FENCE: u32 = 103;
    const CHEST: u32 = 104;
    const UNKNOWN: u32 = 999;

    const D_STONE: u32 = 1;
    const D_FENCE: u32 = 2;
    const D_FENCE_WET: u32 = 3;
    const D_CHEST: u32 = 4;

    fn mappings() -> MappingTable {
        let mut t = MappingTable::new(AIR, STONE);
        t.map_block(STONE, D_STONE, None).unwrap();
        t.map_block(WATER, DESTINATION_AIR, Some(WATER_TAG)).unwrap();
        t.map_block(FENCE, D_FENCE, None).unwrap();
        t.map_block(CHEST, D_CHEST, Some("chest")).unwrap();
        t.define_destination(D_STONE, DestinationBlock::opaque()).unwrap();
        t.define_destination(
            D_FENCE,
            DestinationBlock {
                waterlogged: Some(D_FENCE_WET),
                motion_blocking: true,
                ..DestinationBlock::default()
            },
        )
        .unwrap();
        t.map_biome(7, 70).unwrap();
        t.map_biome(8, 80).unwrap();
        t.set_fallback_biome(1);
        t.register_block_entity("chest", 5);
        t
    }

    fn chunk_with(section: Section) -> Chunk {
        let mut chunk = Chunk::new(ChunkPos::new(2, -1), 2, 2);
        chunk.replace_section(0, section);
        chunk.replace_section(1, Section::filled(AIR));
        chunk
    }

    #[test]
    fn test_remaps_palette_and_counts_non_air() {
        let t = mappings();
        let mut layer = Palette::blocks(AIR);
        layer.set_id_at(0, 0, 0, STONE);
        layer.set_id_at(1, 0, 0, UNKNOWN);
        let chunk = chunk_with(Section::with_layers(vec![layer], None));
        let dest = remap_chunk(&chunk, &t, &t, -64);
        let s = &dest.sections[0];
        assert_eq!(s.blocks.id_at(0, 0, 0), D_STONE);
        assert_eq!(s.blocks.id_at(1, 0, 0), DESTINATION_AIR);
        assert_eq!(s.non_air, 1);
        assert_eq!(dest.sections[1].non_air, 0);
    }

    #[test]
    fn test_missing_layers_become_air() {
        let t = mappings();
        let chunk = chunk_with(Section::new());
        let dest = remap_chunk(&chunk, &t, &t, 0);
        assert_eq!(dest.sections[0].blocks.single_id(), Some(DESTINATION_AIR));
        assert_eq!(dest.sections[0].biomes.single_id(), Some(1));
    }

    #[test]
    fn test_water_overlay_waterlogs() {
        let t = mappings();
        let mut layer0 = Palette::blocks(AIR);
        layer0.set_id_at(3, 3, 3, FENCE);
        layer0.set_id_at(4, 3, 3, STONE);
        let mut layer1 = Palette::blocks(AIR);
        layer1.set_id_at(3, 3, 3, WATER);
        layer1.set_id_at(4, 3, 3, WATER);
        let section = Section::with_layers(vec![layer0, layer1], None);
        let dest = remap_chunk(&chunk_with(section.clone()), &t, &t, 0);
        assert_eq!(dest.sections[0].blocks.id_at(3, 3, 3), D_FENCE_WET);
        // Stone has no waterlogged form and keeps its id.
        assert_eq!(dest.sections[0].blocks.id_at(4, 3, 3), D_STONE);
        assert_eq!(destination_state(&t, &section, 3, 3, 3), D_FENCE_WET);
        assert_eq!(destination_state(&t, &section, 0, 0, 0), DESTINATION_AIR);
    }

    #[test]
    fn test_block_entities_from_record_or_empty() {
        let t = mappings();
        let mut layer = Palette::blocks(AIR);
        layer.set_id_at(1, 2, 3, CHEST);
        layer.set_id_at(5, 2, 3, CHEST);
        let mut chunk = chunk_with(Section::with_layers(vec![layer], None));
        let min_y = -64;
        let recorded = BlockPos::new(2 * 16 + 1, min_y + 2, -16 + 3);
        chunk.put_block_entity(SourceBlockEntity::new(recorded, json!({"Items": [1]})));

        let dest = remap_chunk(&chunk, &t, &t, min_y);
        assert_eq!(dest.block_entities.len(), 2);
        let from_record = dest
            .block_entities
            .iter()
            .find(|be| be.packed_xz == (1 << 4) | 3)
            .unwrap();
        assert_eq!(from_record.data, json!({"Items": [1]}));
        assert_eq!(from_record.y, (min_y + 2) as i16);
        let empty = dest
            .block_entities
            .iter()
            .find(|be| be.packed_xz == (5 << 4) | 3)
            .unwrap();
        assert_eq!(empty.type_id, 5);
        assert_eq!(empty.data, json!({}));
    }

    #[test]
    fn test_block_entity_state_override() {
        let mut t = mappings();
        t.override_block_entity_state("chest", 42);
        let mut layer = Palette::blocks(AIR);
        layer.set_id_at(0, 0, 0, CHEST);
        let mut chunk = chunk_with(Section::with_layers(vec![layer], None));
        chunk.put_block_entity(SourceBlockEntity::new(BlockPos::new(32, 0, -16), json!({})));
        let dest = remap_chunk(&chunk, &t, &t, 0);
        assert_eq!(dest.sections[0].blocks.id_at(0, 0, 0), 42);
    }

    #[test]
    fn test_biome_majority_first_max_wins() {
        let t = mappings();
        let mut biomes = Palette::blocks(7);
        // Cell (0,0,0) of the 4³ grid: 32 of its 64 voxels become 8, but 7
        // reached 32 first in scan order, so 7 wins the tie.
        for sx in 2..4 {
            for sz in 0..4 {
                for sy in 0..4 {
                    biomes.set_id_at(sx, sy, sz, 8);
                }
            }
        }
        // Cell (1,0,0): every voxel is 9, which has no mapping.
        for sx in 4..8 {
            for sz in 0..4 {
                for sy in 0..4 {
                    biomes.set_id_at(sx, sy, sz, 9);
                }
            }
        }
        let section = Section::with_layers(vec![Palette::blocks(AIR)], Some(biomes));
        let dest = remap_chunk(&chunk_with(section), &t, &t, 0);
        let out = &dest.sections[0].biomes;
        assert_eq!(out.len(), 64);
        assert_eq!(out.id_at(0, 0, 0), 70);
        assert_eq!(out.id_at(1, 0, 0), 1);
        assert_eq!(out.id_at(3, 3, 3), 70);
    }

    #[test]
    fn test_heightmaps() {
        let t = mappings();
        let mut layer = Palette::blocks(AIR);
        layer.set_id_at(0, 5, 0, STONE);
        layer.set_id_at(1, 9, 0, CHEST);
        layer.set_id_at(1, 2, 0, FENCE);
        let chunk = chunk_with(Section::with_layers(vec![layer], None));
        let dest = remap_chunk(&chunk, &t, &t, -64);
        let h = &dest.heightmaps;
        assert_eq!(h.world_surface[0], 6);
        assert_eq!(h.motion_blocking[0], 6);
        assert_eq!(h.world_surface[1], 10);
        assert_eq!(h.motion_blocking[1], 3);
        assert_eq!(h.world_surface[2], -64);
        assert_eq!(h.motion_blocking[2], -64);
        assert_eq!(h.bits_per_entry, 6);
    }

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(385), 9);
        assert_eq!(bits_for(257), 9);
        assert_eq!(bits_for(256), 8);
        assert_eq!(bits_for(1), 0);
    }
}
