//! Paletted voxel storage.
//!
//! A [`Palette`] maps a cube of cells (16³ for blocks, 4³ for destination
//! biomes) to ids through a local id table and packed indices. While every
//! cell refers to the same id the palette stays in its single-id form and
//! stores no indices at all.

use crate::bit_packed::{PackedIndices, width_for};
use crate::error::PaletteError;

/// Edge bits of a 16³ block palette.
pub const BLOCK_EDGE_BITS: u8 = 4;

/// Edge bits of a 4³ biome palette.
pub const BIOME_EDGE_BITS: u8 = 2;

/// Palette-compressed cube of ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    edge_bits: u8,
    ids: Vec<u32>,
    indices: PackedIndices,
}

impl Palette {
    /// A single-id palette with `1 << edge_bits` cells per side.
    pub fn filled(edge_bits: u8, id: u32) -> Self {
        let len = 1usize << (3 * edge_bits);
        Self {
            edge_bits,
            ids: vec![id],
            indices: PackedIndices::zeroed(0, len),
        }
    }

    /// A 16³ block palette filled with `id`.
    pub fn blocks(id: u32) -> Self {
        Self::filled(BLOCK_EDGE_BITS, id)
    }

    /// A 4³ biome palette filled with `id`.
    pub fn biomes(id: u32) -> Self {
        Self::filled(BIOME_EDGE_BITS, id)
    }

    /// Builds a palette from an id table and one index per cell.
    ///
    /// Fails if an index does not address the table or the cell count does
    /// not match the edge length. A one-entry table collapses to the
    /// single-id form.
    pub fn from_indices(edge_bits: u8, ids: Vec<u32>, cells: &[u16]) -> Result<Self, PaletteError> {
        let len = 1usize << (3 * edge_bits);
        if cells.len() != len {
            return Err(PaletteError::CellCount {
                expected: len,
                actual: cells.len(),
            });
        }
        if ids.is_empty() {
            return Err(PaletteError::EmptyTable);
        }
        if let Some(&bad) = cells.iter().find(|&&c| c as usize >= ids.len()) {
            return Err(PaletteError::IndexOutOfRange {
                index: bad as usize,
                len: ids.len(),
            });
        }
        let width = width_for(ids.len());
        let mut indices = PackedIndices::zeroed(width, len);
        if width != 0 {
            for (i, &c) in cells.iter().enumerate() {
                indices.set(i, c);
            }
        }
        Ok(Self {
            edge_bits,
            ids,
            indices,
        })
    }

    /// Number of cells per side.
    pub fn edge(&self) -> usize {
        1 << self.edge_bits
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Bits per stored index (0 in the single-id form).
    pub fn bits_per_index(&self) -> u8 {
        self.indices.width()
    }

    /// The id table.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// The id shared by every cell, if the palette is in single-id form.
    pub fn single_id(&self) -> Option<u32> {
        (self.indices.width() == 0).then(|| self.ids[0])
    }

    /// Cell index of `(x, y, z)`.
    #[inline]
    pub fn cell(&self, x: usize, y: usize, z: usize) -> usize {
        let eb = self.edge_bits as usize;
        debug_assert!(x < self.edge() && y < self.edge() && z < self.edge());
        (y << (2 * eb)) | (z << eb) | x
    }

    /// Table index stored for the cell at `(x, y, z)`.
    #[inline]
    pub fn index_at(&self, x: usize, y: usize, z: usize) -> u16 {
        self.indices.get(self.cell(x, y, z))
    }

    /// Id of the cell at `(x, y, z)`.
    #[inline]
    pub fn id_at(&self, x: usize, y: usize, z: usize) -> u32 {
        self.ids[self.index_at(x, y, z) as usize]
    }

    /// Id of the cell at linear `cell`.
    #[inline]
    pub fn id_at_cell(&self, cell: usize) -> u32 {
        self.ids[self.indices.get(cell) as usize]
    }

    /// Writes `id` into the cell at `(x, y, z)`, growing the table if needed.
    pub fn set_id_at(&mut self, x: usize, y: usize, z: usize, id: u32) {
        let cell = self.cell(x, y, z);
        let index = match self.ids.iter().position(|&e| e == id) {
            Some(i) => i as u16,
            None => self.add_id(id),
        };
        if self.indices.width() == 0 {
            // Only table entry 0 exists, which is what every cell already holds.
            return;
        }
        self.indices.set(cell, index);
    }

    /// Appends `id` to the table and returns its index, widening the
    /// index storage when the table outgrows it.
    ///
    /// Adding to a single-id palette leaves every cell on entry 0.
    ///
    /// Once the table holds as many entries as there are cells, entries no
    /// cell refers to are dropped first, which keeps every index within
    /// `u16` range.
    pub fn add_id(&mut self, id: u32) -> u16 {
        if self.ids.len() >= self.len() {
            self.compact();
        }
        self.ids.push(id);
        let needed = width_for(self.ids.len());
        if needed > self.indices.width() {
            self.indices = self.indices.with_width(needed);
        }
        debug_assert!(self.ids.len() <= usize::from(u16::MAX) + 1);
        (self.ids.len() - 1) as u16
    }

    /// Drops table entries that no cell uses and renumbers the rest in
    /// their original order.
    fn compact(&mut self) {
        let mut used = vec![false; self.ids.len()];
        for index in self.indices.iter() {
            used[index as usize] = true;
        }
        let mut renumbered = vec![0u16; self.ids.len()];
        let mut ids = Vec::new();
        for (old, &id) in self.ids.iter().enumerate() {
            if used[old] {
                renumbered[old] = ids.len() as u16;
                ids.push(id);
            }
        }
        let width = width_for(ids.len());
        let mut indices = PackedIndices::zeroed(width, self.len());
        if width != 0 {
            for (cell, index) in self.indices.iter().enumerate() {
                indices.set(cell, renumbered[index as usize]);
            }
        }
        self.ids = ids;
        self.indices = indices;
    }

    /// Id stored at table position `index`.
    pub fn id_by_index(&self, index: usize) -> Option<u32> {
        self.ids.get(index).copied()
    }

    /// Replaces the id stored at table position `index`, re-targeting every
    /// cell that uses it.
    pub fn set_id_by_index(&mut self, index: usize, id: u32) -> Result<(), PaletteError> {
        let len = self.ids.len();
        let slot = self
            .ids
            .get_mut(index)
            .ok_or(PaletteError::IndexOutOfRange { index, len })?;
        *slot = id;
        Ok(())
    }

    /// Rewrites every table entry through `f`, leaving cell indices alone.
    pub fn remap_ids(&mut self, mut f: impl FnMut(u32) -> u32) {
        for id in &mut self.ids {
            *id = f(*id);
        }
    }

    /// All stored table indices in cell order.
    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.indices.iter()
    }

    /// All ids in cell order.
    pub fn cell_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().map(move |i| self.ids[i as usize])
    }

    /// Whether any table entry satisfies `pred`.
    pub fn any_id(&self, mut pred: impl FnMut(u32) -> bool) -> bool {
        self.ids.iter().any(|&id| pred(id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filled_is_single_id() {
        let p = Palette::blocks(7);
        assert_eq!(p.len(), 4096);
        assert_eq!(p.single_id(), Some(7));
        assert_eq!(p.bits_per_index(), 0);
        assert_eq!(p.id_at(15, 15, 15), 7);
    }

    #[test]
    fn test_set_id_at_leaves_single_form() {
        let mut p = Palette::blocks(0);
        p.set_id_at(1, 2, 3, 5);
        assert_eq!(p.single_id(), None);
        assert_eq!(p.bits_per_index(), 2);
        assert_eq!(p.id_at(1, 2, 3), 5);
        assert_eq!(p.id_at(0, 0, 0), 0);
        assert_eq!(p.ids(), &[0, 5]);
    }

    #[test]
    fn test_set_same_id_on_single_form_is_noop() {
        let mut p = Palette::blocks(3);
        p.set_id_at(4, 4, 4, 3);
        assert_eq!(p.single_id(), Some(3));
    }

    #[test]
    fn test_palette_grows_through_widths() {
        let mut p = Palette::blocks(0);
        for id in 1..=20u32 {
            p.set_id_at(id as usize % 16, 0, 0, id);
        }
        assert_eq!(p.bits_per_index(), 8);
        assert_eq!(p.id_at(4, 0, 0), 20);
        assert_eq!(p.id_at(5, 0, 0), 5);
    }

    #[test]
    fn test_cell_layout_is_y_then_z_then_x() {
        let p = Palette::blocks(0);
        assert_eq!(p.cell(1, 0, 0), 1);
        assert_eq!(p.cell(0, 0, 1), 16);
        assert_eq!(p.cell(0, 1, 0), 256);
        let b = Palette::biomes(0);
        assert_eq!(b.cell(3, 2, 1), (2 << 4) | (1 << 2) | 3);
        assert_eq!(b.len(), 64);
    }

    #[test]
    fn test_id_table_compacts_under_churn() {
        let mut p = Palette::biomes(0);
        p.set_id_at(3, 3, 3, 7);
        for id in 100..100_000u32 {
            p.set_id_at(0, 0, 0, id);
        }
        assert!(p.ids().len() <= p.len() + 1);
        assert_eq!(p.id_at(0, 0, 0), 99_999);
        assert_eq!(p.id_at(3, 3, 3), 7);
        assert_eq!(p.id_at(1, 0, 0), 0);
    }

    #[test]
    fn test_set_id_by_index_retargets_cells() {
        let mut p = Palette::blocks(1);
        p.set_id_at(0, 0, 0, 2);
        p.set_id_by_index(1, 9).unwrap();
        assert_eq!(p.id_at(0, 0, 0), 9);
        assert_eq!(p.id_at(1, 0, 0), 1);
    }

    #[test]
    fn test_set_id_by_index_out_of_range() {
        let mut p = Palette::blocks(1);
        let err = p.set_id_by_index(3, 9).unwrap_err();
        assert_eq!(err, PaletteError::IndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn test_remap_ids_keeps_layout() {
        let mut p = Palette::blocks(1);
        p.set_id_at(2, 2, 2, 2);
        p.remap_ids(|id| id * 10);
        assert_eq!(p.ids(), &[10, 20]);
        assert_eq!(p.id_at(2, 2, 2), 20);
        assert_eq!(p.id_at(0, 0, 0), 10);
    }

    #[test]
    fn test_from_indices_validates() {
        let cells = vec![0u16; 64];
        assert!(Palette::from_indices(BIOME_EDGE_BITS, vec![4], &cells).is_ok());
        assert!(matches!(
            Palette::from_indices(BIOME_EDGE_BITS, vec![4], &cells[..10]),
            Err(PaletteError::CellCount { .. })
        ));
        let mut bad = cells.clone();
        bad[3] = 2;
        assert!(matches!(
            Palette::from_indices(BIOME_EDGE_BITS, vec![4, 5], &bad),
            Err(PaletteError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_from_indices_reads_back() {
        let cells: Vec<u16> = (0..4096).map(|i| (i % 3) as u16).collect();
        let p = Palette::from_indices(BLOCK_EDGE_BITS, vec![10, 11, 12], &cells).unwrap();
        assert_eq!(p.id_at_cell(4), 11);
        assert_eq!(p.indices().take(4).collect::<Vec<_>>(), vec![0, 1, 2, 0]);
        assert_eq!(p.cell_ids().filter(|&id| id == 12).count(), 1365);
    }
}
