//! Nibble-packed light storage.
//!
//! A [`LightArray`] holds one 4-bit level per voxel of a 16³ section,
//! indexed `(y << 8) | (z << 4) | x` with even indices in the low nibble.
//! A [`LightData`] stacks one optional array per section of a column plus
//! one slab below the bottom and one above the top.

use std::fmt;

/// Bytes per section of nibble light.
pub const LIGHT_ARRAY_BYTES: usize = 2048;

/// Brightest light level.
pub const MAX_LIGHT: u8 = 15;

/// 4096 nibbles of light for one section.
#[derive(Clone, PartialEq, Eq)]
pub struct LightArray(Box<[u8; LIGHT_ARRAY_BYTES]>);

#[inline]
fn light_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < 16 && y < 16 && z < 16);
    (y << 8) | (z << 4) | x
}

impl LightArray {
    /// All levels zero.
    pub fn dark() -> Self {
        Self(Box::new([0; LIGHT_ARRAY_BYTES]))
    }

    /// Every voxel at `level`.
    pub fn uniform(level: u8) -> Self {
        let level = level & 0xF;
        Self(Box::new([level | (level << 4); LIGHT_ARRAY_BYTES]))
    }

    /// All levels at [`MAX_LIGHT`].
    pub fn full() -> Self {
        Self::uniform(MAX_LIGHT)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        self.get_index(light_index(x, y, z))
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, level: u8) {
        self.set_index(light_index(x, y, z), level);
    }

    /// Level at nibble `index`.
    #[inline]
    pub fn get_index(&self, index: usize) -> u8 {
        let byte = self.0[index >> 1];
        if index & 1 == 0 { byte & 0xF } else { byte >> 4 }
    }

    /// Writes the level at nibble `index`.
    #[inline]
    pub fn set_index(&mut self, index: usize, level: u8) {
        let byte = &mut self.0[index >> 1];
        let level = level & 0xF;
        *byte = if index & 1 == 0 {
            (*byte & 0xF0) | level
        } else {
            (*byte & 0x0F) | (level << 4)
        };
    }

    /// Raw bytes in wire order.
    pub fn as_bytes(&self) -> &[u8; LIGHT_ARRAY_BYTES] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; LIGHT_ARRAY_BYTES]) -> Self {
        Self(Box::new(bytes))
    }

    pub fn is_dark(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for LightArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lit = (0..LIGHT_ARRAY_BYTES * 2)
            .filter(|&i| self.get_index(i) != 0)
            .count();
        f.debug_struct("LightArray").field("lit", &lit).finish()
    }
}

/// Light for a whole column: `section_count + 2` optional slabs.
///
/// Slab 0 lies below the bottom section and slab `section_count + 1` above
/// the top one. `None` means "no light" and is never a placeholder for
/// unknown data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LightData {
    slabs: Vec<Option<LightArray>>,
}

impl LightData {
    /// Slabs for `section_count` sections, all absent.
    pub fn empty(section_count: usize) -> Self {
        Self {
            slabs: vec![None; section_count + 2],
        }
    }

    /// Slabs for `section_count` sections, all present and dark.
    pub fn dark(section_count: usize) -> Self {
        Self {
            slabs: (0..section_count + 2).map(|_| Some(LightArray::dark())).collect(),
        }
    }

    pub fn from_slabs(slabs: Vec<Option<LightArray>>) -> Self {
        Self { slabs }
    }

    /// Number of slabs, including the two padding slabs.
    pub fn len(&self) -> usize {
        self.slabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slabs.is_empty()
    }

    /// Number of real sections covered.
    pub fn section_count(&self) -> usize {
        self.slabs.len().saturating_sub(2)
    }

    pub fn slab(&self, slot: usize) -> Option<&LightArray> {
        self.slabs.get(slot).and_then(Option::as_ref)
    }

    pub fn slab_mut(&mut self, slot: usize) -> Option<&mut LightArray> {
        self.slabs.get_mut(slot).and_then(Option::as_mut)
    }

    /// The slab at `slot`, allocated dark if absent.
    pub fn slab_or_dark(&mut self, slot: usize) -> &mut LightArray {
        self.slabs[slot].get_or_insert_with(LightArray::dark)
    }

    pub fn set_slab(&mut self, slot: usize, slab: Option<LightArray>) {
        self.slabs[slot] = slab;
    }

    pub fn slabs(&self) -> &[Option<LightArray>] {
        &self.slabs
    }

    /// Level at `(x, y, z)` in `slot`; absent slabs read as 0.
    #[inline]
    pub fn level(&self, slot: usize, x: usize, y: usize, z: usize) -> u8 {
        self.slab(slot).map_or(0, |s| s.get(x, y, z))
    }

    /// Whether the two light sets differ in length, slab presence or any byte.
    pub fn differs_from(&self, other: &LightData) -> bool {
        self != other
    }
}

/// Sky and block light of one column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkLight {
    pub sky: LightData,
    pub block: LightData,
}

impl ChunkLight {
    pub fn differs_from(&self, other: &ChunkLight) -> bool {
        self.sky.differs_from(&other.sky) || self.block.differs_from(&other.block)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
