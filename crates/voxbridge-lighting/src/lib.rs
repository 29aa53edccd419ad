//! Sky and block light for translated chunk columns: nibble light storage,
//! the flood-fill light engine, content-addressed cache keys and the shared
//! bounded light cache with its worker pool.

pub mod cache;
pub mod cache_key;
pub mod engine;
pub mod error;
pub mod light_array;
mod workers;

pub use cache::{CacheEntry, LightCache};
pub use cache_key::{Fnv1a, cache_key};
pub use engine::{LightInput, compute_block_light, compute_light, compute_sky_light};
pub use error::LightError;
pub use light_array::{ChunkLight, LIGHT_ARRAY_BYTES, LightArray, LightData, MAX_LIGHT};
pub use workers::LightWorkers;
