//! Block-entity records on both sides of the translation.

use serde::{Deserialize, Serialize};

use crate::coords::BlockPos;

/// A block entity as announced by the source protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceBlockEntity {
    /// Absolute position; at most one record exists per position.
    pub position: BlockPos,
    /// Opaque tag payload.
    pub data: serde_json::Value,
}

impl SourceBlockEntity {
    pub fn new(position: BlockPos, data: serde_json::Value) -> Self {
        Self { position, data }
    }
}

/// A block entity in the destination representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DestinationBlockEntity {
    /// Section-local `x` in the high nibble, `z` in the low nibble.
    pub packed_xz: u8,
    /// Absolute block `y`.
    pub y: i16,
    /// Destination block-entity type id.
    pub type_id: i32,
    /// Payload; `Value::Null` entities are not emitted.
    pub data: serde_json::Value,
    /// Destination block state the converter wants in place of the mapped one.
    pub block_state_override: Option<u32>,
}

impl DestinationBlockEntity {
    /// An entity of `type_id` at `pos` with an empty object payload.
    pub fn empty(pos: BlockPos, type_id: i32) -> Self {
        let (x, _, z) = pos.local();
        Self {
            packed_xz: pack_xz(x, z),
            y: pos.y as i16,
            type_id,
            data: serde_json::Value::Object(serde_json::Map::new()),
            block_state_override: None,
        }
    }

    /// Whether the entity carries a payload worth sending.
    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }
}

/// Packs section-local `x` and `z` into one byte.
pub fn pack_xz(x: usize, z: usize) -> u8 {
    (((x & 15) << 4) | (z & 15)) as u8
}
