//! Per-connection world state for the chunk translator.
//!
//! [`ChunkStore`] keeps source chunks as they arrive, converts them to the
//! destination layout and lights them through a shared
//! [`LightCache`](voxbridge_lighting::LightCache). Everything it sends or
//! requests goes out through a [`Transport`].

pub mod error;
pub mod payload;
mod queue;
pub mod remap;
pub mod scheduler;
pub mod store;
pub mod transport;

pub use error::WorldError;
pub use payload::LightPayload;
pub use remap::{DestinationChunk, DestinationSection, Heightmaps, destination_state, remap_chunk};
pub use scheduler::TickReport;
pub use store::{BlockChange, ChunkStore, ViewWindow};
pub use transport::{
    ChunkWithLight, LightUpdate, LoadBarrier, ObjectAnchor, Outbound, RecordingTransport,
    SubChunkOffset, SubChunkRequest, Transport,
};
