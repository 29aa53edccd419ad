//! Source-protocol sub-chunk sections.
//!
//! A [`Section`] carries up to two block layers (layer 0 is the primary
//! layer, layer 1 the overlay used for waterlogging), an optional 16³ biome
//! palette and, while the section still waits for its base content, an
//! ordered log of block edits that arrived early.

use crate::coords::SECTION_EDGE;
use crate::error::SectionShapeError;
use crate::palette::{BIOME_EDGE_BITS, Palette};

/// Number of block layers a section may carry.
pub const MAX_LAYERS: usize = 2;

/// A block edit received before the section's base content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEdit {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub layer: u8,
    pub id: u32,
}

/// One 16³ sub-chunk in the source representation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    layers: Vec<Palette>,
    biomes: Option<Palette>,
    pending: Option<Vec<PendingEdit>>,
}

impl Section {
    /// A section whose content is known: no layers yet, no pending log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A section with a single layer filled with `id`.
    pub fn filled(id: u32) -> Self {
        Self {
            layers: vec![Palette::blocks(id)],
            biomes: None,
            pending: None,
        }
    }

    /// A section built from explicit layers and an optional biome palette.
    ///
    /// Nothing is validated here; see [`Section::check_shape`].
    pub fn with_layers(layers: Vec<Palette>, biomes: Option<Palette>) -> Self {
        Self {
            layers,
            biomes,
            pending: None,
        }
    }

    /// Placeholder for a slot whose content has not arrived yet.
    ///
    /// Edits to it are buffered until [`Section::apply_pending`] runs.
    pub fn awaiting_fill() -> Self {
        Self {
            layers: Vec::new(),
            biomes: None,
            pending: Some(Vec::new()),
        }
    }

    /// Whether the section still waits for its base content.
    pub fn is_awaiting_fill(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of edits waiting to be replayed.
    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, Vec::len)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, layer: usize) -> Option<&Palette> {
        self.layers.get(layer)
    }

    pub fn layers(&self) -> &[Palette] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Palette] {
        &mut self.layers
    }

    pub fn biomes(&self) -> Option<&Palette> {
        self.biomes.as_ref()
    }

    pub fn set_biomes(&mut self, biomes: Palette) {
        self.biomes = Some(biomes);
    }

    /// Creates missing layers up to and including `layer`, each filled with
    /// `air`. `None` for layers past [`MAX_LAYERS`].
    pub fn ensure_layer(&mut self, layer: usize, air: u32) -> Option<&mut Palette> {
        if layer >= MAX_LAYERS {
            return None;
        }
        while self.layers.len() <= layer {
            self.layers.push(Palette::blocks(air));
        }
        self.layers.get_mut(layer)
    }

    /// Checks that the block layers are 16³ and at most [`MAX_LAYERS`] deep
    /// and that the biome palette is either 16³ or 4³.
    pub fn check_shape(&self) -> Result<(), SectionShapeError> {
        if self.layers.len() > MAX_LAYERS {
            return Err(SectionShapeError::TooManyLayers(self.layers.len()));
        }
        if let Some((layer, p)) = self.layers.iter().enumerate().find(|(_, p)| p.edge() != SECTION_EDGE) {
            return Err(SectionShapeError::LayerEdge { layer, edge: p.edge() });
        }
        if let Some(biomes) = &self.biomes
            && biomes.edge() != SECTION_EDGE
            && biomes.edge() != 1 << BIOME_EDGE_BITS
        {
            return Err(SectionShapeError::BiomeEdge(biomes.edge()));
        }
        Ok(())
    }

    /// Id at `(x, y, z)` in `layer`, or `None` when the layer does not exist.
    pub fn block_at(&self, layer: usize, x: usize, y: usize, z: usize) -> Option<u32> {
        self.layers.get(layer).map(|p| p.id_at(x, y, z))
    }

    /// Appends an edit to the pending log.
    ///
    /// Returns `false` and logs nothing if the section is not awaiting fill
    /// or the edit targets a layer past [`MAX_LAYERS`].
    pub fn buffer_edit(&mut self, edit: PendingEdit) -> bool {
        if edit.layer as usize >= MAX_LAYERS {
            return false;
        }
        match &mut self.pending {
            Some(log) => {
                log.push(edit);
                true
            }
            None => false,
        }
    }

    /// Takes over the content of `other`.
    ///
    /// Block layers are replaced wholesale; the biome palette is replaced
    /// only when `other` carries one. The pending log is left untouched so
    /// that [`Section::apply_pending`] can replay it afterwards.
    pub fn merge_from(&mut self, other: Section) {
        self.layers = other.layers;
        if other.biomes.is_some() {
            self.biomes = other.biomes;
        }
    }

    /// Replays buffered edits in arrival order and leaves the
    /// awaiting-fill state. Returns the number of replayed edits; edits for
    /// layers past [`MAX_LAYERS`] are skipped.
    pub fn apply_pending(&mut self, air: u32) -> usize {
        let Some(log) = self.pending.take() else {
            return 0;
        };
        let mut replayed = 0;
        for edit in &log {
            let Some(layer) = self.ensure_layer(edit.layer as usize, air) else {
                continue;
            };
            layer.set_id_at(edit.x as usize, edit.y as usize, edit.z as usize, edit.id);
            replayed += 1;
        }
        replayed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
