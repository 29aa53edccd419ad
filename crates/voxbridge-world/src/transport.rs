//! Outbound messages and the capabilities the store talks through.
//!
//! The store never frames packets itself. Everything it wants to tell the
//! destination client, or ask of the source server, goes through a
//! [`Transport`] passed into each call.

use voxbridge_voxel::{BlockPos, ChunkPos, SubChunkPos};

use crate::payload::LightPayload;
use crate::remap::DestinationChunk;

/// A converted chunk together with its light.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkWithLight {
    pub chunk: DestinationChunk,
    pub light: LightPayload,
}

/// New light for a chunk the client already has.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightUpdate {
    pub pos: ChunkPos,
    pub light: LightPayload,
}

/// Offset of a requested sub-chunk from the batch base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubChunkOffset {
    pub dx: i32,
    pub y: i32,
    pub dz: i32,
}

/// One batch of sub-chunk requests, relative to `(base.x, 0, base.z)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubChunkRequest {
    pub base: SubChunkPos,
    pub offsets: Vec<SubChunkOffset>,
}

impl SubChunkRequest {
    /// Absolute positions covered by the batch.
    pub fn positions(&self) -> impl Iterator<Item = SubChunkPos> + '_ {
        self.offsets
            .iter()
            .map(|o| SubChunkPos::new(self.base.x + o.dx, o.y, self.base.z + o.dz))
    }
}

/// What client-side objects hang off of, for [`Transport::detach_objects`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectAnchor {
    /// Objects attached to a single block.
    Block(BlockPos),
    /// Every object inside a chunk column.
    Chunk(ChunkPos),
}

/// Outbound side effects of the chunk store.
pub trait Transport {
    /// Sends a full chunk with light to the destination client.
    fn send_chunk_with_light(&mut self, message: ChunkWithLight);

    /// Sends a light-only update for an already-sent chunk.
    fn send_light_update(&mut self, message: LightUpdate);

    /// Tells the destination client to drop a chunk.
    fn forget_chunk(&mut self, pos: ChunkPos);

    /// Asks the source server for a batch of sub-chunks.
    fn request_sub_chunks(&mut self, request: SubChunkRequest);

    /// Moves the destination client's chunk cache center.
    fn set_view_center(&mut self, pos: ChunkPos);

    /// Removes client-side objects whose existence depends on `anchor`.
    fn detach_objects(&mut self, anchor: ObjectAnchor);
}

/// Reports whether the connection may start requesting sub-chunks.
pub trait LoadBarrier {
    fn initially_spawned(&self) -> bool;
}

impl LoadBarrier for bool {
    fn initially_spawned(&self) -> bool {
        *self
    }
}

impl<F: Fn() -> bool> LoadBarrier for F {
    fn initially_spawned(&self) -> bool {
        self()
    }
}

/// Every message a [`RecordingTransport`] has seen, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    ChunkWithLight(Box<ChunkWithLight>),
    LightUpdate(LightUpdate),
    ForgetChunk(ChunkPos),
    SubChunkRequest(SubChunkRequest),
    ViewCenter(ChunkPos),
    Detach(ObjectAnchor),
}

/// A [`Transport`] that keeps everything it is handed.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub messages: Vec<Outbound>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all recorded messages.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.messages)
    }

    /// Positions of chunks sent with light, in order.
    pub fn chunks_sent(&self) -> Vec<ChunkPos> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Outbound::ChunkWithLight(c) => Some(c.chunk.pos),
                _ => None,
            })
            .collect()
    }

    /// Positions of light-only updates, in order.
    pub fn light_updates(&self) -> Vec<ChunkPos> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Outbound::LightUpdate(u) => Some(u.pos),
                _ => None,
            })
            .collect()
    }

    /// All sub-chunk request batches, in order.
    pub fn sub_chunk_requests(&self) -> Vec<&SubChunkRequest> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Outbound::SubChunkRequest(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send_chunk_with_light(&mut self, message: ChunkWithLight) {
        self.messages.push(Outbound::ChunkWithLight(Box::new(message)));
    }

    fn send_light_update(&mut self, message: LightUpdate) {
        self.messages.push(Outbound::LightUpdate(message));
    }

    fn forget_chunk(&mut self, pos: ChunkPos) {
        self.messages.push(Outbound::ForgetChunk(pos));
    }

    fn request_sub_chunks(&mut self, request: SubChunkRequest) {
        self.messages.push(Outbound::SubChunkRequest(request));
    }

    fn set_view_center(&mut self, pos: ChunkPos) {
        self.messages.push(Outbound::ViewCenter(pos));
    }

    fn detach_objects(&mut self, anchor: ObjectAnchor) {
        self.messages.push(Outbound::Detach(anchor));
    }
}
