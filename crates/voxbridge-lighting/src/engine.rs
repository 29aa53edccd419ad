//! Sky and block light for one chunk column.
//!
//! Light is computed from the column's destination block palettes plus
//! whatever its four horizontal neighbors already have: their border light
//! is injected one way into this column, and light never leaves the column
//! horizontally. The computation is pure; equal inputs give equal output.

use std::collections::VecDeque;
use std::sync::Arc;

use voxbridge_voxel::{DESTINATION_AIR, Direction, LightProperties, Palette};

use crate::light_array::{ChunkLight, LightArray, LightData, MAX_LIGHT};

/// Everything the light engine reads for one column.
///
/// Neighbor slots follow [`Direction::ALL`] order (`-X, +X, -Z, +Z`).
#[derive(Clone, Debug)]
pub struct LightInput {
    /// Destination block palettes, bottom to top.
    pub sections: Arc<[Palette]>,
    /// Destination block palettes of neighbors that have been converted.
    pub neighbor_sections: [Option<Arc<[Palette]>>; 4],
    /// Light last stored for each neighbor.
    pub neighbor_light: [Option<Arc<ChunkLight>>; 4],
}

impl LightInput {
    /// Input for a column without any known neighbors.
    pub fn isolated(sections: Arc<[Palette]>) -> Self {
        Self {
            sections,
            neighbor_sections: Default::default(),
            neighbor_light: Default::default(),
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

/// The six spread directions.
const SPREAD: [(i32, i32, i32); 6] = [
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
];

/// Queue entry: section index in the high bits, light index in the low 12.
#[inline]
fn encode(section: usize, x: usize, y: usize, z: usize) -> u32 {
    ((section as u32) << 12) | ((y as u32) << 8) | ((z as u32) << 4) | x as u32
}

#[inline]
fn decode(entry: u32) -> (usize, usize, usize, usize) {
    (
        (entry >> 12) as usize,
        (entry & 0xF) as usize,
        ((entry >> 8) & 0xF) as usize,
        ((entry >> 4) & 0xF) as usize,
    )
}

/// Attenuation when light enters a voxel of `id`.
#[inline]
fn step_cost<P: LightProperties + ?Sized>(props: &P, id: u32) -> u8 {
    props.filter_light(id).max(1)
}

/// Computes sky light.
///
/// Each column starts at 15 above the top section and loses
/// `max(1, filter)` at every voxel with a non-zero filter; the remaining
/// level carries into the slab below the bottom section. Border light from
/// neighbors is then injected and the result flood-filled inside the column.
pub fn compute_sky_light<P: LightProperties + ?Sized>(input: &LightInput, props: &P) -> LightData {
    let sections = &input.sections[..];
    let count = sections.len();
    let mut light = LightData::dark(count);
    light.set_slab(count + 1, Some(LightArray::full()));

    // Remaining level per (x, z), indexed (z << 4) | x.
    let mut column = [MAX_LIGHT; 256];

    for (s, palette) in sections.iter().enumerate().rev() {
        let slab = light.slab_or_dark(s + 1);
        if palette.single_id() == Some(DESTINATION_AIR) {
            fill_columns(slab, &column);
            continue;
        }
        for y in (0..16).rev() {
            for z in 0..16 {
                for x in 0..16 {
                    let col = (z << 4) | x;
                    let mut level = column[col];
                    if level == 0 {
                        continue;
                    }
                    let filter = props.filter_light(palette.id_at(x, y, z));
                    if filter > 0 {
                        level = level.saturating_sub(filter.max(1));
                    }
                    column[col] = level;
                    if level > 0 {
                        slab.set(x, y, z, level);
                    }
                }
            }
        }
    }
    fill_columns(light.slab_or_dark(0), &column);

    let mut queue = VecDeque::new();
    inject_border_light(&mut light, sections, sky_of(input), &mut queue, props);

    for s in 0..count {
        let Some(slab) = light.slab(s + 1) else {
            continue;
        };
        for y in 0..16 {
            for z in 0..16 {
                for x in 0..16 {
                    let level = slab.get(x, y, z);
                    if level > 1 && has_darker_neighbor(slab, x, y, z, level) {
                        queue.push_back(encode(s, x, y, z));
                    }
                }
            }
        }
    }

    spread(&mut light, sections, &mut queue, props);
    light
}

/// Computes block light.
///
/// Emitters seed the flood fill at their emission level. Slabs that no
/// light reaches stay absent.
pub fn compute_block_light<P: LightProperties + ?Sized>(input: &LightInput, props: &P) -> LightData {
    let sections = &input.sections[..];
    let mut light = LightData::empty(sections.len());
    let mut queue = VecDeque::new();

    for (s, palette) in sections.iter().enumerate() {
        if !palette.any_id(|id| props.emit_light(id) > 0) {
            continue;
        }
        for y in 0..16 {
            for z in 0..16 {
                for x in 0..16 {
                    let emission = props.emit_light(palette.id_at(x, y, z));
                    if emission > 0 {
                        light.slab_or_dark(s + 1).set(x, y, z, emission.min(MAX_LIGHT));
                        queue.push_back(encode(s, x, y, z));
                    }
                }
            }
        }
    }

    inject_border_light(&mut light, sections, block_of(input), &mut queue, props);
    if !queue.is_empty() {
        spread(&mut light, sections, &mut queue, props);
    }
    light
}

/// Computes both halves on the calling thread.
pub fn compute_light<P: LightProperties + ?Sized>(input: &LightInput, props: &P) -> ChunkLight {
    ChunkLight {
        sky: compute_sky_light(input, props),
        block: compute_block_light(input, props),
    }
}

fn sky_of(input: &LightInput) -> [Option<&LightData>; 4] {
    input.neighbor_light.each_ref().map(|n| n.as_deref().map(|l| &l.sky))
}

fn block_of(input: &LightInput) -> [Option<&LightData>; 4] {
    input.neighbor_light.each_ref().map(|n| n.as_deref().map(|l| &l.block))
}

fn fill_columns(slab: &mut LightArray, column: &[u8; 256]) {
    for z in 0..16 {
        for x in 0..16 {
            let level = column[(z << 4) | x];
            if level > 0 {
                for y in 0..16 {
                    slab.set(x, y, z, level);
                }
            }
        }
    }
}

fn has_darker_neighbor(slab: &LightArray, x: usize, y: usize, z: usize, level: u8) -> bool {
    let (x, z) = (x as i32, z as i32);
    [(-1, 0), (1, 0), (0, -1), (0, 1)].iter().any(|&(dx, dz)| {
        let (nx, nz) = (x + dx, z + dz);
        (0..16).contains(&nx)
            && (0..16).contains(&nz)
            && slab.get(nx as usize, y, nz as usize) < level - 1
    })
}

/// Maps a border coordinate `a` on the face shared with `dir` to the
/// neighbor's and our own `(x, z)`.
fn border_cells(dir: Direction, a: usize) -> ((usize, usize), (usize, usize)) {
    match dir {
        Direction::NegX => ((15, a), (0, a)),
        Direction::PosX => ((0, a), (15, a)),
        Direction::NegZ => ((a, 15), (a, 0)),
        Direction::PosZ => ((a, 0), (a, 15)),
    }
}

/// Reads each neighbor's border face and raises our own border cells to
/// `neighbor - max(1, filter)` where that is brighter. Raised cells are
/// queued for spreading. Neighbors are never written.
fn inject_border_light<P: LightProperties + ?Sized>(
    light: &mut LightData,
    sections: &[Palette],
    neighbors: [Option<&LightData>; 4],
    queue: &mut VecDeque<u32>,
    props: &P,
) {
    for (dir, neighbor) in Direction::ALL.into_iter().zip(neighbors) {
        let Some(neighbor) = neighbor else {
            continue;
        };
        for (s, palette) in sections.iter().enumerate() {
            let Some(border) = neighbor.slab(s + 1) else {
                continue;
            };
            for a in 0..16 {
                let ((nx, nz), (tx, tz)) = border_cells(dir, a);
                for y in 0..16 {
                    let incoming = border.get(nx, y, nz);
                    if incoming <= 1 {
                        continue;
                    }
                    let cost = step_cost(props, palette.id_at(tx, y, tz));
                    if incoming <= cost {
                        continue;
                    }
                    let candidate = incoming - cost;
                    let slab = light.slab_or_dark(s + 1);
                    if candidate > slab.get(tx, y, tz) {
                        slab.set(tx, y, tz, candidate);
                        queue.push_back(encode(s, tx, y, tz));
                    }
                }
            }
        }
    }
}

/// Breadth-first spread inside the column. Vertical moves may cross into
/// adjacent real sections; horizontal moves stop at the column edge.
fn spread<P: LightProperties + ?Sized>(
    light: &mut LightData,
    sections: &[Palette],
    queue: &mut VecDeque<u32>,
    props: &P,
) {
    let count = sections.len() as i32;
    while let Some(entry) = queue.pop_front() {
        let (s, x, y, z) = decode(entry);
        let level = light.level(s + 1, x, y, z);
        if level <= 1 {
            continue;
        }
        for (dx, dy, dz) in SPREAD {
            let (nx, nz) = (x as i32 + dx, z as i32 + dz);
            if !(0..16).contains(&nx) || !(0..16).contains(&nz) {
                continue;
            }
            let mut ny = y as i32 + dy;
            let mut ns = s as i32;
            if ny < 0 {
                ns -= 1;
                ny = 15;
            } else if ny > 15 {
                ns += 1;
                ny = 0;
            }
            if ns < 0 || ns >= count {
                continue;
            }
            let (nx, ny, nz, ns) = (nx as usize, ny as usize, nz as usize, ns as usize);
            let cost = step_cost(props, sections[ns].id_at(nx, ny, nz));
            if level <= cost {
                continue;
            }
            let candidate = level - cost;
            let slab = light.slab_or_dark(ns + 1);
            if candidate > slab.get(nx, ny, nz) {
                slab.set(nx, ny, nz, candidate);
                queue.push_back(encode(ns, nx, ny, nz));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: u32 = 1;
    const LAMP: u32 = 2;
    const GLASS: u32 = 3;
    const WATER: u32 = 4;
    const LEAVES: u32 = 5;
    const TORCH: u32 = 6;

    struct Props;

    impl LightProperties for Props {
        fn filter_light(&self, id: u32) -> u8 {
            match id {
                STONE | LAMP => 15,
                WATER => 2,
                LEAVES => 1,
                _ => 0,
            }
        }

        fn emit_light(&self, id: u32) -> u8 {
            match id {
                LAMP => 15,
                TORCH => 14,
                _ => 0,
            }
        }
    }

    fn air_sections(n: usize) -> Vec<Palette> {
        (0..n).map(|_| Palette::blocks(DESTINATION_AIR)).collect()
    }

    fn input(sections: Vec<Palette>) -> LightInput {
        LightInput::isolated(sections.into())
    }

    #[test]
    fn test_all_air_is_fully_sky_lit() {
        let light = compute_sky_light(&input(air_sections(4)), &Props);
        assert_eq!(light.len(), 6);
        for slot in 0..6 {
            let slab = light.slab(slot).expect("sky slabs are always present");
            assert!(slab.as_bytes().iter().all(|&b| b == 0xFF), "slot {slot}");
        }
    }

    #[test]
    fn test_all_air_has_no_block_light() {
        let light = compute_block_light(&input(air_sections(4)), &Props);
        assert!(light.slabs().iter().all(Option::is_none));
    }

    #[test]
    fn test_stone_blocks_column_below() {
        let mut sections = air_sections(2);
        sections[0].set_id_at(8, 0, 8, STONE);
        let light = compute_sky_light(&input(sections), &Props);
        // Stone cell and the below-bottom slab under it are dark.
        assert_eq!(light.level(1, 8, 0, 8), 0);
        assert_eq!(light.level(0, 8, 5, 8), 0);
        // Everything above and beside it stays fully lit.
        assert_eq!(light.level(1, 8, 1, 8), 15);
        assert_eq!(light.level(1, 7, 0, 8), 15);
        assert_eq!(light.level(1, 8, 0, 9), 15);
        assert_eq!(light.level(0, 7, 0, 8), 15);
    }

    #[test]
    fn test_roof_shadow_filled_from_open_side() {
        // Stone roof over x in 0..8 at y = 15; the rest of the column is open.
        let mut section = Palette::blocks(DESTINATION_AIR);
        for x in 0..8 {
            for z in 0..16 {
                section.set_id_at(x, 15, z, STONE);
            }
        }
        let light = compute_sky_light(&input(vec![section]), &Props);
        assert_eq!(light.level(1, 8, 10, 3), 15);
        assert_eq!(light.level(1, 7, 10, 3), 14);
        assert_eq!(light.level(1, 0, 10, 3), 7);
        assert_eq!(light.level(1, 4, 14, 3), 11);
    }

    #[test]
    fn test_glass_like_transparent_blocks_do_not_attenuate() {
        let mut sections = air_sections(1);
        sections[0].set_id_at(0, 15, 0, GLASS);
        let light = compute_sky_light(&input(sections), &Props);
        assert_eq!(light.level(1, 0, 0, 0), 15);
    }

    #[test]
    fn test_emitter_falls_off_by_one_per_step() {
        let mut sections = air_sections(1);
        sections[0].set_id_at(8, 8, 8, LAMP);
        let light = compute_block_light(&input(sections), &Props);
        assert_eq!(light.level(1, 8, 8, 8), 15);
        assert_eq!(light.level(1, 9, 8, 8), 14);
        assert_eq!(light.level(1, 8, 10, 8), 13);
        assert_eq!(light.level(1, 10, 10, 10), 9);
        assert!(light.slab(0).is_none());
        assert!(light.slab(2).is_none());
    }

    #[test]
    fn test_block_light_crosses_sections_vertically() {
        let mut sections = air_sections(2);
        sections[0].set_id_at(0, 15, 0, LAMP);
        let light = compute_block_light(&input(sections), &Props);
        assert_eq!(light.level(2, 0, 0, 0), 14);
        assert_eq!(light.level(2, 0, 3, 0), 11);
    }

    #[test]
    fn test_neighbor_block_light_is_injected_one_way() {
        let mut lit = LightData::empty(1);
        lit.slab_or_dark(1).set(15, 4, 4, 10);
        let neighbor = ChunkLight {
            sky: LightData::dark(1),
            block: lit,
        };
        let mut inp = input(air_sections(1));
        inp.neighbor_light[Direction::NegX as usize] = Some(Arc::new(neighbor));
        let light = compute_block_light(&inp, &Props);
        assert_eq!(light.level(1, 0, 4, 4), 9);
        assert_eq!(light.level(1, 1, 4, 4), 8);
        assert_eq!(light.level(1, 0, 4, 5), 8);
    }

    #[test]
    fn test_injected_light_respects_filter() {
        let mut lit = LightData::empty(1);
        lit.slab_or_dark(1).set(8, 4, 0, 12);
        let neighbor = ChunkLight {
            sky: LightData::dark(1),
            block: lit,
        };
        let mut sections = air_sections(1);
        sections[0].set_id_at(8, 4, 15, STONE);
        let mut inp = input(sections);
        inp.neighbor_light[Direction::PosZ as usize] = Some(Arc::new(neighbor));
        let light = compute_block_light(&inp, &Props);
        assert!(light.slab(1).is_none_or(|s| s.is_dark()));
    }

    #[test]
    fn test_deterministic() {
        let mut sections = air_sections(3);
        sections[1].set_id_at(3, 3, 3, LAMP);
        for x in 0..16 {
            sections[2].set_id_at(x, 0, 5, STONE);
        }
        let inp = input(sections);
        assert_eq!(compute_light(&inp, &Props), compute_light(&inp, &Props));
    }

    #[test]
    fn test_torch_light_is_manhattan_falloff() {
        let mut sections = air_sections(3);
        sections[1].set_id_at(8, 8, 8, TORCH);
        let light = compute_block_light(&input(sections), &Props);
        for s in 0..3usize {
            for y in 0..16usize {
                for z in 0..16usize {
                    for x in 0..16usize {
                        let d = x.abs_diff(8) + (s * 16 + y).abs_diff(24) + z.abs_diff(8);
                        let expected = 14u8.saturating_sub(d as u8);
                        assert_eq!(light.level(s + 1, x, y, z), expected, "({x}, {}, {z})", s * 16 + y);
                    }
                }
            }
        }
        assert!(light.slab(0).is_none());
        assert!(light.slab(4).is_none());
    }

    #[test]
    fn test_sky_never_brightens_down_layered_columns() {
        let mut sections = air_sections(2);
        for z in 0..16 {
            for x in 0..16 {
                sections[1].set_id_at(x, 12, z, LEAVES);
                sections[1].set_id_at(x, 5, z, WATER);
                sections[0].set_id_at(x, 10, z, GLASS);
                sections[0].set_id_at(x, 3, z, WATER);
            }
        }
        let light = compute_sky_light(&input(sections), &Props);
        for z in 0..16 {
            for x in 0..16 {
                let mut above = MAX_LIGHT;
                for wy in (0..32).rev() {
                    let level = light.level(wy / 16 + 1, x, wy % 16, z);
                    assert!(level <= above, "column ({x}, {z}) brightens at y = {wy}");
                    above = level;
                }
            }
        }
        assert_eq!(light.level(2, 4, 13, 4), 15);
        assert_eq!(light.level(2, 4, 12, 4), 14);
        assert_eq!(light.level(2, 4, 5, 4), 12);
        assert_eq!(light.level(1, 4, 10, 4), 12);
        assert_eq!(light.level(1, 4, 3, 4), 10);
        assert_eq!(light.level(0, 4, 9, 4), 10);
    }

    /// Small xorshift so the mixed chunk is the same on every run.
    fn mixed_sections(count: usize, mut seed: u64) -> Vec<Palette> {
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        let mut sections = air_sections(count);
        for section in &mut sections {
            for y in 0..16 {
                for z in 0..16 {
                    for x in 0..16 {
                        let id = match next() % 400 {
                            0 => LAMP,
                            1 => TORCH,
                            2..=59 => STONE,
                            60..=99 => WATER,
                            100..=139 => LEAVES,
                            140..=159 => GLASS,
                            _ => continue,
                        };
                        section.set_id_at(x, y, z, id);
                    }
                }
            }
        }
        sections
    }

    /// Raises `levels` to the least fixpoint of
    /// `level(c) = max(start(c), level(n) - max(1, filter(c)))` over the six
    /// neighbors inside the column, sweeping until nothing changes.
    fn relax(sections: &[Palette], mut levels: Vec<u8>) -> Vec<u8> {
        let count = sections.len() as i32;
        let at = |s: i32, x: i32, y: i32, z: i32| (s as usize) * 4096 + ((y << 8) | (z << 4) | x) as usize;
        loop {
            let mut changed = false;
            for s in 0..count {
                for y in 0..16 {
                    for z in 0..16 {
                        for x in 0..16 {
                            let cost = step_cost(&Props, sections[s as usize].id_at(x as usize, y as usize, z as usize));
                            let mut best = levels[at(s, x, y, z)];
                            for (dx, dy, dz) in SPREAD {
                                let (nx, nz) = (x + dx, z + dz);
                                let wy = s * 16 + y + dy;
                                if !(0..16).contains(&nx) || !(0..16).contains(&nz) || !(0..count * 16).contains(&wy) {
                                    continue;
                                }
                                let n = levels[at(wy / 16, nx, wy % 16, nz)];
                                if n > cost {
                                    best = best.max(n - cost);
                                }
                            }
                            if best > levels[at(s, x, y, z)] {
                                levels[at(s, x, y, z)] = best;
                                changed = true;
                            }
                        }
                    }
                }
            }
            if !changed {
                return levels;
            }
        }
    }

    fn assert_matches_reference(light: &LightData, reference: &[u8]) {
        for (i, &expected) in reference.iter().enumerate() {
            let (s, cell) = (i / 4096, i % 4096);
            let (x, y, z) = (cell & 15, cell >> 8, (cell >> 4) & 15);
            assert_eq!(light.level(s + 1, x, y, z), expected, "section {s} ({x}, {y}, {z})");
        }
    }

    #[test]
    fn test_block_light_matches_brute_force_on_mixed_chunk() {
        let sections = mixed_sections(2, 0x9E37_79B9_7F4A_7C15);
        let start: Vec<u8> = sections
            .iter()
            .flat_map(|p| p.cell_ids().map(|id| Props.emit_light(id)))
            .collect();
        assert!(start.iter().any(|&e| e > 0));
        let reference = relax(&sections, start);

        let light = compute_block_light(&input(sections), &Props);
        assert_matches_reference(&light, &reference);
    }

    #[test]
    fn test_sky_light_matches_brute_force_on_mixed_chunk() {
        let sections = mixed_sections(2, 0x2545_F491_4F6C_DD1D);
        // Straight-down columns first, top section to bottom.
        let mut start = vec![0u8; sections.len() * 4096];
        let mut column = [MAX_LIGHT; 256];
        for (s, palette) in sections.iter().enumerate().rev() {
            for y in (0..16).rev() {
                for z in 0..16 {
                    for x in 0..16 {
                        let col = (z << 4) | x;
                        column[col] = column[col].saturating_sub(Props.filter_light(palette.id_at(x, y, z)));
                        start[s * 4096 + ((y << 8) | col)] = column[col];
                    }
                }
            }
        }
        let reference = relax(&sections, start);

        let light = compute_sky_light(&input(sections), &Props);
        assert_matches_reference(&light, &reference);
    }
}
