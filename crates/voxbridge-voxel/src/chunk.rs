//! Source-protocol chunk columns.

use crate::block_entity::SourceBlockEntity;
use crate::coords::{BlockPos, ChunkPos};
use crate::section::Section;

/// A full-height column of source sections plus its block entities.
///
/// The section array has a fixed length (`world_height / 16`). Slots past the
/// declared non-empty count start as awaiting-fill placeholders and are
/// replaced in place when their sub-chunk arrives.
#[derive(Clone, Debug)]
pub struct Chunk {
    pos: ChunkPos,
    sections: Box<[Section]>,
    block_entities: Vec<SourceBlockEntity>,
    declared: usize,
}

impl Chunk {
    /// Creates a column with `section_count` slots, the first
    /// `declared_non_empty` of which are ready to be written directly.
    pub fn new(pos: ChunkPos, section_count: usize, declared_non_empty: usize) -> Self {
        let sections = (0..section_count)
            .map(|i| {
                if i < declared_non_empty {
                    Section::new()
                } else {
                    Section::awaiting_fill()
                }
            })
            .collect();
        Self {
            pos,
            sections,
            block_entities: Vec::new(),
            declared: declared_non_empty.min(section_count),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Number of sections the source declared as present up front.
    pub fn declared_non_empty(&self) -> usize {
        self.declared
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index)
    }

    /// Swaps the section at `index` for `section`, returning the old one.
    pub fn replace_section(&mut self, index: usize, section: Section) -> Option<Section> {
        self.sections
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, section))
    }

    pub fn block_entities(&self) -> &[SourceBlockEntity] {
        &self.block_entities
    }

    pub fn block_entity_at(&self, pos: BlockPos) -> Option<&SourceBlockEntity> {
        self.block_entities.iter().find(|be| be.position == pos)
    }

    pub fn remove_block_entity_at(&mut self, pos: BlockPos) -> Option<SourceBlockEntity> {
        let idx = self.block_entities.iter().position(|be| be.position == pos)?;
        Some(self.block_entities.swap_remove(idx))
    }

    /// Stores `entity`, replacing any record at the same position.
    pub fn put_block_entity(&mut self, entity: SourceBlockEntity) {
        self.remove_block_entity_at(entity.position);
        self.block_entities.push(entity);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
