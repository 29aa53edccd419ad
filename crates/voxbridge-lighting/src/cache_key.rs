//! Content hash identifying a light computation.
//!
//! Two [`LightInput`]s with the same key produce the same light, so the key
//! can index the shared [`crate::LightCache`] across connections. The key is
//! 64-bit FNV-1a folded over 32-bit words in a fixed order:
//!
//! 1. section count, then every section's ids (one id for single-id
//!    palettes, otherwise all 4096 in cell order);
//! 2. per neighbor (`-X, +X, -Z, +Z`) a presence marker and, when present,
//!    the ids on the border face it shares with this column;
//! 3. per neighbor the border-face nibbles of its sky light, then the same
//!    for block light.

use voxbridge_voxel::{Direction, Palette};

use crate::engine::LightInput;
use crate::light_array::{LightArray, LightData};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Word-wise FNV-1a accumulator.
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1a {
    pub fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    #[inline]
    pub fn write(&mut self, word: u32) {
        self.0 ^= u64::from(word);
        self.0 = self.0.wrapping_mul(FNV_PRIME);
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

/// Computes the cache key of `input`.
pub fn cache_key(input: &LightInput) -> u64 {
    let mut h = Fnv1a::new();

    h.write(input.sections.len() as u32);
    for palette in input.sections.iter() {
        match palette.single_id() {
            Some(id) => h.write(id),
            None => palette.cell_ids().for_each(|id| h.write(id)),
        }
    }

    for (dir, neighbor) in Direction::ALL.into_iter().zip(&input.neighbor_sections) {
        match neighbor {
            None => h.write(0),
            Some(sections) => {
                h.write(1);
                h.write(sections.len() as u32);
                for palette in sections.iter() {
                    hash_border_ids(&mut h, palette, dir.opposite());
                }
            }
        }
    }

    for pick_sky in [true, false] {
        for (dir, neighbor) in Direction::ALL.into_iter().zip(&input.neighbor_light) {
            match neighbor {
                None => h.write(0),
                Some(light) => {
                    h.write(1);
                    let data = if pick_sky { &light.sky } else { &light.block };
                    hash_border_light(&mut h, data, dir.opposite());
                }
            }
        }
    }

    h.finish()
}

/// `(x, z)` of cell `a` on the column face lying in direction `face`.
fn face_cell(face: Direction, a: usize) -> (usize, usize) {
    match face {
        Direction::NegX => (0, a),
        Direction::PosX => (15, a),
        Direction::NegZ => (a, 0),
        Direction::PosZ => (a, 15),
    }
}

fn hash_border_ids(h: &mut Fnv1a, palette: &Palette, face: Direction) {
    if let Some(id) = palette.single_id() {
        h.write(id);
        return;
    }
    for y in 0..16 {
        for a in 0..16 {
            let (x, z) = face_cell(face, a);
            h.write(palette.id_at(x, y, z));
        }
    }
}

fn hash_border_light(h: &mut Fnv1a, data: &LightData, face: Direction) {
    h.write(data.len() as u32);
    for slab in data.slabs() {
        match slab {
            None => h.write(0),
            Some(slab) => {
                h.write(1);
                hash_face_nibbles(h, slab, face);
            }
        }
    }
}

/// Packs the 256 face nibbles eight to a word.
fn hash_face_nibbles(h: &mut Fnv1a, slab: &LightArray, face: Direction) {
    let mut word = 0u32;
    let mut filled = 0;
    for y in 0..16 {
        for a in 0..16 {
            let (x, z) = face_cell(face, a);
            word = (word << 4) | u32::from(slab.get(x, y, z));
            filled += 1;
            if filled == 8 {
                h.write(word);
                word = 0;
                filled = 0;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
