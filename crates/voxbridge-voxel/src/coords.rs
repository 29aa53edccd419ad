//! Chunk, sub-chunk and block coordinates.
//!
//! [`ChunkPos`] packs into a single `i64` key so that it can serve as the
//! identity of a column in per-connection maps and in the shared light cache.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Side length of a section in voxels.
pub const SECTION_EDGE: usize = 16;

/// One of the four horizontal neighbor directions of a chunk column.
///
/// The discriminant order (`-X, +X, -Z, +Z`) is the order in which neighbor
/// data is collected, hashed and injected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// −X
    NegX = 0,
    /// +X
    PosX = 1,
    /// −Z
    NegZ = 2,
    /// +Z
    PosZ = 3,
}

impl Direction {
    /// All four directions in collection order.
    pub const ALL: [Direction; 4] = [
        Direction::NegX,
        Direction::PosX,
        Direction::NegZ,
        Direction::PosZ,
    ];

    /// Returns the `(dx, dz)` chunk offset for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::NegX => (-1, 0),
            Direction::PosX => (1, 0),
            Direction::NegZ => (0, -1),
            Direction::PosZ => (0, 1),
        }
    }

    /// Returns the opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::NegX => Direction::PosX,
            Direction::PosX => Direction::NegX,
            Direction::NegZ => Direction::PosZ,
            Direction::PosZ => Direction::NegZ,
        }
    }
}

/// Identifies a chunk column in the world.
///
/// Hashes as its [`ChunkPos::key`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new chunk position.
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packs the position into a single 64-bit key (`x` low, `z` high).
    pub fn key(self) -> i64 {
        (self.x as u32 as i64) | ((self.z as u32 as i64) << 32)
    }

    /// Inverse of [`ChunkPos::key`].
    pub fn from_key(key: i64) -> Self {
        Self {
            x: key as i32,
            z: (key >> 32) as i32,
        }
    }

    /// Returns the chunk containing the given block coordinates.
    pub fn containing(block_x: i32, block_z: i32) -> Self {
        Self::new(block_x >> 4, block_z >> 4)
    }

    /// Returns the chunk containing a floating-point world position.
    pub fn containing_point(x: f64, z: f64) -> Self {
        Self::containing(x.floor() as i32, z.floor() as i32)
    }

    /// Returns the neighboring column in the given direction. Wraps at the
    /// `i32` bounds.
    pub fn neighbor(self, dir: Direction) -> Self {
        let (dx, dz) = dir.offset();
        Self::new(self.x.wrapping_add(dx), self.z.wrapping_add(dz))
    }

    /// Returns the four horizontal neighbors in `-X, +X, -Z, +Z` order.
    pub fn neighbors(self) -> [ChunkPos; 4] {
        Direction::ALL.map(|dir| self.neighbor(dir))
    }

    /// Chebyshev distance between two columns.
    pub fn chebyshev_distance(self, other: ChunkPos) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }
}

impl Hash for ChunkPos {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.key());
    }
}

/// Identifies one 16-block-tall sub-chunk of a column.
///
/// `y` is the signed section coordinate in world space (block y >> 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SubChunkPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The column this sub-chunk belongs to.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }
}

/// Absolute block position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The column containing this block.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::containing(self.x, self.z)
    }

    /// The sub-chunk containing this block.
    pub fn sub_chunk(self) -> SubChunkPos {
        SubChunkPos::new(self.x >> 4, self.y >> 4, self.z >> 4)
    }

    /// Section-local coordinates, each in `0..16`.
    pub fn local(self) -> (usize, usize, usize) {
        (
            (self.x & 15) as usize,
            (self.y & 15) as usize,
            (self.z & 15) as usize,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
