//! Light section masks and arrays as the destination protocol carries them.

use voxbridge_lighting::{ChunkLight, LightArray, LightData};

/// Light slabs split into present/empty masks plus the present arrays.
///
/// Masks are bit sets over light slots (slot 0 below the world), stored as
/// little-endian `u64` words with trailing zero words dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LightPayload {
    pub sky_mask: Vec<u64>,
    pub block_mask: Vec<u64>,
    pub empty_sky_mask: Vec<u64>,
    pub empty_block_mask: Vec<u64>,
    pub sky: Vec<LightArray>,
    pub block: Vec<LightArray>,
}

impl LightPayload {
    pub fn from_light(light: &ChunkLight) -> Self {
        let (sky_mask, empty_sky_mask, sky) = split(&light.sky);
        let (block_mask, empty_block_mask, block) = split(&light.block);
        Self {
            sky_mask,
            block_mask,
            empty_sky_mask,
            empty_block_mask,
            sky,
            block,
        }
    }
}

fn split(data: &LightData) -> (Vec<u64>, Vec<u64>, Vec<LightArray>) {
    let mut present = BitMask::default();
    let mut empty = BitMask::default();
    let mut arrays = Vec::new();
    for (slot, slab) in data.slabs().iter().enumerate() {
        match slab {
            Some(array) => {
                present.set(slot);
                arrays.push(array.clone());
            }
            None => empty.set(slot),
        }
    }
    (present.into_words(), empty.into_words(), arrays)
}

#[derive(Default)]
struct BitMask(Vec<u64>);

impl BitMask {
    fn set(&mut self, bit: usize) {
        let word = bit / 64;
        if self.0.len() <= word {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1 << (bit % 64);
    }

    fn into_words(self) -> Vec<u64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_split_present_and_absent() {
        let mut block = LightData::empty(2);
        block.slab_or_dark(2);
        let light = ChunkLight {
            sky: LightData::dark(2),
            block,
        };
        let p = LightPayload::from_light(&light);
        assert_eq!(p.sky_mask, vec![0b1111]);
        assert!(p.empty_sky_mask.is_empty());
        assert_eq!(p.block_mask, vec![0b0100]);
        assert_eq!(p.empty_block_mask, vec![0b1011]);
        assert_eq!(p.sky.len(), 4);
        assert_eq!(p.block.len(), 1);
    }

    #[test]
    fn test_masks_span_multiple_words() {
        let light = ChunkLight {
            sky: LightData::dark(70),
            block: LightData::empty(70),
        };
        let p = LightPayload::from_light(&light);
        assert_eq!(p.sky_mask, vec![u64::MAX, 0xFF]);
        assert_eq!(p.empty_block_mask, vec![u64::MAX, 0xFF]);
    }
}
