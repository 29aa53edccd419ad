//! Fixed-width index storage for paletted sections.
//!
//! Indices never straddle a word: each `u64` holds `64 / width` entries and
//! any leftover high bits stay zero. Widths are 0, 2, 4, 8 or 16; width 0
//! stores nothing and reads back index 0 everywhere.

/// Index storage for one palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedIndices {
    words: Vec<u64>,
    width: u8,
    len: usize,
}

/// Smallest supported width able to address `count` palette entries.
pub fn width_for(count: usize) -> u8 {
    match count {
        0 | 1 => 0,
        2..=4 => 2,
        5..=16 => 4,
        17..=256 => 8,
        _ => 16,
    }
}

impl PackedIndices {
    /// Storage for `len` indices of `width` bits, all zero.
    pub fn zeroed(width: u8, len: usize) -> Self {
        debug_assert!(matches!(width, 0 | 2 | 4 | 8 | 16), "unsupported width {width}");
        let words = if width == 0 {
            0
        } else {
            len.div_ceil(64 / width as usize)
        };
        Self {
            words: vec![0; words],
            width,
            len,
        }
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, u32) {
        let per_word = 64 / self.width as usize;
        (index / per_word, ((index % per_word) * self.width as usize) as u32)
    }

    /// Index stored at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> u16 {
        debug_assert!(index < self.len);
        if self.width == 0 {
            return 0;
        }
        let (word, shift) = self.locate(index);
        let mask = (1u64 << self.width) - 1;
        ((self.words[word] >> shift) & mask) as u16
    }

    /// Overwrites the index at `index`. `value` must fit the current width.
    #[inline]
    pub fn set(&mut self, index: usize, value: u16) {
        debug_assert!(index < self.len);
        if self.width == 0 {
            debug_assert_eq!(value, 0);
            return;
        }
        debug_assert!(self.width >= 16 || value < (1u16 << self.width));
        let (word, shift) = self.locate(index);
        let mask = (1u64 << self.width) - 1;
        let slot = &mut self.words[word];
        *slot = (*slot & !(mask << shift)) | (u64::from(value) << shift);
    }

    /// Re-encodes every stored index at `width` bits.
    ///
    /// Narrowing is only valid when every stored index fits the new width.
    pub fn with_width(&self, width: u8) -> Self {
        let mut out = Self::zeroed(width, self.len);
        if width != 0 {
            for i in 0..self.len {
                out.set(i, self.get(i));
            }
        }
        out
    }

    /// Current bits per index.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of logical indices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// All indices in storage order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_zero_reads_zero_and_allocates_nothing() {
        let idx = PackedIndices::zeroed(0, 4096);
        assert_eq!(idx.get(4095), 0);
        assert!(idx.words().is_empty());
    }

    #[test]
    fn test_word_count_does_not_straddle() {
        // 4096 entries, 16 per word at 4 bits.
        assert_eq!(PackedIndices::zeroed(4, 4096).words().len(), 256);
        // 64 biome entries at 2 bits fit in two words.
        assert_eq!(PackedIndices::zeroed(2, 64).words().len(), 2);
        assert_eq!(PackedIndices::zeroed(16, 5).words().len(), 2);
    }

    #[test]
    fn test_set_only_touches_target_slot() {
        let mut idx = PackedIndices::zeroed(4, 40);
        idx.set(17, 9);
        idx.set(16, 15);
        assert_eq!(idx.get(17), 9);
        assert_eq!(idx.get(16), 15);
        assert_eq!(idx.get(18), 0);
        idx.set(16, 1);
        assert_eq!(idx.get(17), 9);
    }

    #[test]
    fn test_with_width_preserves_values() {
        let mut idx = PackedIndices::zeroed(2, 100);
        for i in 0..100 {
            idx.set(i, (i % 4) as u16);
        }
        let wide = idx.with_width(8);
        assert_eq!(wide.width(), 8);
        assert!(wide.iter().enumerate().all(|(i, v)| v == (i % 4) as u16));
    }

    #[test]
    fn test_width_for_thresholds() {
        assert_eq!(width_for(1), 0);
        assert_eq!(width_for(2), 2);
        assert_eq!(width_for(4), 2);
        assert_eq!(width_for(5), 4);
        assert_eq!(width_for(17), 8);
        assert_eq!(width_for(257), 16);
    }
}
