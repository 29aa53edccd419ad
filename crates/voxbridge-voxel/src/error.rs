//! Error types for voxel storage and mapping tables.

use thiserror::Error;

/// Errors raised while building or editing a [`crate::Palette`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaletteError {
    #[error("palette index {index} out of range (table has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("expected {expected} cells, got {actual}")]
    CellCount { expected: usize, actual: usize },

    #[error("palette id table is empty")]
    EmptyTable,
}

/// Structural problems in a section received from the source.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SectionShapeError {
    #[error("section has {0} block layers, at most 2 are allowed")]
    TooManyLayers(usize),

    #[error("block layer {layer} has edge {edge}, expected 16")]
    LayerEdge { layer: usize, edge: usize },

    #[error("biome palette has edge {0}, expected 16 or 4")]
    BiomeEdge(usize),
}

/// Errors raised while registering entries in a [`crate::MappingTable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("source id {0} is already mapped")]
    DuplicateSource(u32),

    #[error("destination id {0} is already registered")]
    DuplicateDestination(u32),

    #[error("legacy id {0} is already aliased")]
    DuplicateLegacy(u32),

    #[error("source biome {0} is already mapped")]
    DuplicateBiome(u32),
}
