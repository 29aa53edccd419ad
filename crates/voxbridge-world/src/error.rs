//! Sequencing and payload errors reported by the chunk store.

use thiserror::Error;
use voxbridge_voxel::{SectionShapeError, SubChunkPos};

/// A source update that arrived out of order and was dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WorldError {
    #[error("sub-chunk {0:?} was not requested")]
    NotRequested(SubChunkPos),

    #[error("sub-chunk {0:?} belongs to a chunk that is not loaded")]
    ChunkNotLoaded(SubChunkPos),

    #[error("sub-chunk {0:?} lies outside the world height")]
    SectionOutOfRange(SubChunkPos),

    #[error("sub-chunk {0:?} is malformed: {1}")]
    MalformedSection(SubChunkPos, #[source] SectionShapeError),
}
