//! Source-protocol voxel storage: coordinates, paletted sections, chunk
//! columns and the mapping capabilities used to translate them.

pub mod bit_packed;
pub mod block_entity;
pub mod chunk;
pub mod coords;
pub mod error;
pub mod mapping;
pub mod palette;
pub mod section;

pub use block_entity::{DestinationBlockEntity, SourceBlockEntity, pack_xz};
pub use chunk::Chunk;
pub use coords::{BlockPos, ChunkPos, Direction, SECTION_EDGE, SubChunkPos};
pub use error::{MappingError, PaletteError, SectionShapeError};
pub use mapping::{
    BlockEntityFactory, BlockMappings, DESTINATION_AIR, DestinationBlock, LightProperties,
    MappingTable, WATER_TAG,
};
pub use palette::{BIOME_EDGE_BITS, BLOCK_EDGE_BITS, Palette};
pub use section::{MAX_LAYERS, PendingEdit, Section};
