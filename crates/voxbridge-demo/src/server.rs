//! A synthetic source server: a flat world with scattered torches and a
//! chest in every column, served one sub-chunk at a time.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde_json::json;
use voxbridge_voxel::{
    BlockPos, DestinationBlock, MappingError, MappingTable, Palette, Section, SourceBlockEntity,
    SubChunkPos,
};

pub const AIR: u32 = 0;
pub const STONE: u32 = 1;
pub const DIRT: u32 = 2;
pub const GRASS: u32 = 3;
pub const WATER: u32 = 4;
pub const TORCH: u32 = 5;
pub const CHEST: u32 = 6;
pub const GLASS: u32 = 7;
/// Pre-flattening id the server still uses for deep stone.
pub const LEGACY_STONE: u32 = 0x1_0001;

const PLAINS: u32 = 1;

/// Top block of the terrain.
const SURFACE_Y: i32 = -4;

/// Mapping table for the synthetic id space.
pub fn mappings() -> Result<MappingTable, MappingError> {
    let mut t = MappingTable::new(AIR, STONE);
    t.map_block(STONE, 1, None)?;
    t.map_block(DIRT, 10, None)?;
    t.map_block(GRASS, 9, None)?;
    t.map_block(WATER, 86, Some("water"))?;
    t.map_block(TORCH, 190, None)?;
    t.map_block(CHEST, 250, Some("chest"))?;
    t.map_block(GLASS, 300, None)?;
    t.alias_legacy(LEGACY_STONE, STONE)?;

    for opaque in [1, 9, 10] {
        t.define_destination(opaque, DestinationBlock::opaque())?;
    }
    t.define_destination(
        86,
        DestinationBlock {
            filter_light: 2,
            ..DestinationBlock::default()
        },
    )?;
    t.define_destination(190, DestinationBlock::emitter(14))?;
    t.define_destination(
        250,
        DestinationBlock {
            motion_blocking: true,
            waterlogged: Some(251),
            ..DestinationBlock::default()
        },
    )?;
    t.define_destination(
        300,
        DestinationBlock {
            motion_blocking: true,
            ..DestinationBlock::default()
        },
    )?;

    t.map_biome(PLAINS, 5)?;
    t.set_fallback_biome(0);
    t.register_block_entity("chest", 2);
    Ok(t)
}

pub struct SyntheticServer {
    seed: u64,
}

impl SyntheticServer {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, pos: SubChunkPos) -> Xoshiro256StarStar {
        let mixed = (pos.x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (pos.z as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ (pos.y as u64);
        Xoshiro256StarStar::seed_from_u64(self.seed ^ mixed)
    }

    /// Content of one sub-chunk and its block entities.
    pub fn sub_chunk(&self, pos: SubChunkPos) -> (Section, Vec<SourceBlockEntity>) {
        let base_y = pos.y * 16;
        let biomes = Some(Palette::blocks(PLAINS));

        if base_y > SURFACE_Y {
            return (Section::with_layers(vec![Palette::blocks(AIR)], biomes), Vec::new());
        }
        if base_y + 15 < SURFACE_Y - 32 {
            return (Section::with_layers(vec![Palette::blocks(LEGACY_STONE)], biomes), Vec::new());
        }

        let mut blocks = Palette::blocks(AIR);
        for y in 0..16 {
            let id = match base_y + y as i32 {
                wy if wy == SURFACE_Y => GRASS,
                wy if wy >= SURFACE_Y - 3 && wy < SURFACE_Y => DIRT,
                wy if wy < SURFACE_Y => STONE,
                _ => continue,
            };
            for z in 0..16 {
                for x in 0..16 {
                    blocks.set_id_at(x, y, z, id);
                }
            }
        }

        let mut layers = vec![blocks];
        let mut entities = Vec::new();
        let surface_local = SURFACE_Y - base_y;
        if (0..16).contains(&surface_local) {
            let surface_local = surface_local as usize;
            let mut rng = self.rng_for(pos);

            // A shallow pond in the grass.
            let mut overlay = Palette::blocks(AIR);
            let (px, pz) = (rng.gen_range(2..12), rng.gen_range(2..12));
            for x in px..px + 3 {
                for z in pz..pz + 3 {
                    layers[0].set_id_at(x, surface_local, z, WATER);
                }
            }
            if surface_local < 15 {
                let (tx, tz) = (rng.gen_range(0..16), rng.gen_range(0..16));
                layers[0].set_id_at(tx, surface_local + 1, tz, TORCH);

                let (cx, cz) = (rng.gen_range(0..16), rng.gen_range(0..16));
                layers[0].set_id_at(cx, surface_local + 1, cz, CHEST);
                if rng.gen_bool(0.25) {
                    overlay.set_id_at(cx, surface_local + 1, cz, WATER);
                }
                let position = BlockPos::new(
                    pos.x * 16 + cx as i32,
                    base_y + surface_local as i32 + 1,
                    pos.z * 16 + cz as i32,
                );
                entities.push(SourceBlockEntity::new(
                    position,
                    json!({"id": "Chest", "Items": [{"Name": "torch", "Count": rng.gen_range(1..64)}]}),
                ));
            }
            layers.push(overlay);
        }

        (Section::with_layers(layers, biomes), entities)
    }

    /// A glass roof block placed over the spawn column mid-session.
    pub fn roof_edit(&self) -> (BlockPos, u32) {
        (BlockPos::new(8, SURFACE_Y + 4, 8), GLASS)
    }
}
