//! End-to-end sessions through the chunk store with a recording transport.

use std::sync::Arc;

use voxbridge_config::Config;
use voxbridge_lighting::LightCache;
use voxbridge_voxel::{
    BlockPos, ChunkPos, DESTINATION_AIR, DestinationBlock, MappingTable, Section, SubChunkPos,
};
use voxbridge_world::{BlockChange, ChunkStore, Outbound, RecordingTransport};

const AIR: u32 = 10;
const STONE: u32 = 11;
const LAMP: u32 = 12;

const D_STONE: u32 = 1;
const D_LAMP: u32 = 2;

fn mappings() -> Arc<MappingTable> {
    let mut t = MappingTable::new(AIR, STONE);
    t.map_block(STONE, D_STONE, None).unwrap();
    t.map_block(LAMP, D_LAMP, None).unwrap();
    t.define_destination(D_STONE, DestinationBlock::opaque()).unwrap();
    t.define_destination(D_LAMP, DestinationBlock::emitter(14)).unwrap();
    Arc::new(t)
}

/// Two sections, y = 0..32.
fn config() -> Config {
    let mut config = Config::default();
    config.world.min_y = 0;
    config.world.height = 32;
    config.view.radius = 4;
    config
}

fn new_store(cache: &Arc<LightCache>) -> ChunkStore {
    let t = mappings();
    ChunkStore::new(&config(), t.clone(), t, Arc::clone(cache))
}

fn air_section() -> Section {
    Section::filled(AIR)
}

fn roofed_section() -> Section {
    let mut section = Section::filled(AIR);
    let layer = section.ensure_layer(0, AIR).unwrap();
    for x in 0..16 {
        for z in 0..16 {
            layer.set_id_at(x, 15, z, STONE);
        }
    }
    section
}

fn load(store: &mut ChunkStore, pos: ChunkPos, sections: [Section; 2], t: &mut RecordingTransport) {
    let chunk = store.create_chunk(pos, 2, t).unwrap();
    for (i, section) in sections.into_iter().enumerate() {
        chunk.replace_section(i, section);
    }
    store.send_chunk_next_tick(pos);
}

#[test]
fn late_neighbor_relights_roofed_chunk_without_resend() {
    let cache = Arc::new(LightCache::new(256));
    let mut store = new_store(&cache);
    let mut t = RecordingTransport::new();
    let a = ChunkPos::new(0, 0);
    let b = ChunkPos::new(1, 0);

    load(&mut store, a, [air_section(), roofed_section()], &mut t);
    store.tick(&mut t, &false);
    assert_eq!(t.chunks_sent(), vec![a]);
    let under_roof = store.sent_light(a).unwrap().sky.level(2, 15, 14, 8);
    assert_eq!(under_roof, 0);

    load(&mut store, b, [air_section(), air_section()], &mut t);
    let report = store.tick(&mut t, &false);
    assert_eq!(report.chunks_sent, 1);
    assert_eq!(report.light_updates_sent, 1);

    assert_eq!(t.chunks_sent(), vec![a, b]);
    assert_eq!(t.light_updates(), vec![a]);

    let light = store.sent_light(a).unwrap();
    // Slot 2 holds section 1, slot 1 holds section 0.
    assert_eq!(light.sky.level(2, 15, 14, 8), 14);
    assert_eq!(light.sky.level(2, 10, 14, 8), 9);
    assert_eq!(light.sky.level(2, 0, 14, 8), 0);
    assert_eq!(light.sky.level(1, 12, 3, 0), 11);
    // The roof itself stays dark.
    assert_eq!(light.sky.level(2, 15, 15, 8), 0);

    let Some(Outbound::LightUpdate(update)) = t.messages.last() else {
        panic!("expected a light update last");
    };
    assert_eq!(update.light.sky.len(), 4);
    assert_eq!(update.light.sky[2].get(15, 14, 8), 14);
}

#[test]
fn sub_chunk_session_with_deferred_lamp() {
    let cache = Arc::new(LightCache::new(256));
    let mut store = new_store(&cache);
    let mut t = RecordingTransport::new();
    let pos = ChunkPos::new(0, 0);

    store.create_chunk(pos, 0, &mut t).unwrap();
    store.request_sub_chunks(pos, 0, 2);
    store.set_player_position(8.0, 8.0);

    let lamp = BlockPos::new(0, 0, 0);
    assert_eq!(store.handle_block_change(lamp, 0, LAMP, &mut t), BlockChange::Deferred);
    assert!(store.is_in_unloaded_section(lamp));

    store.tick(&mut t, &|| true);
    assert_eq!(t.sub_chunk_requests().len(), 1);
    for y in 0..2 {
        store
            .merge_sub_chunk(SubChunkPos::new(0, y, 0), air_section(), Vec::new())
            .unwrap();
    }

    store.tick(&mut t, &|| true);
    assert_eq!(t.chunks_sent(), vec![pos]);
    assert_eq!(store.destination_block_state(lamp), D_LAMP);

    let light = store.sent_light(pos).unwrap();
    assert_eq!(light.block.level(1, 0, 0, 0), 14);
    assert_eq!(light.block.level(1, 1, 0, 0), 13);
    assert_eq!(light.block.level(1, 2, 0, 0), 12);
    assert_eq!(light.block.level(1, 0, 2, 1), 11);
    // Block light never reaches the slab below the world here.
    assert!(light.block.slab(0).is_none());
    assert!(!store.is_in_unloaded_section(lamp));

    // A direct change after the merge applies immediately.
    assert_eq!(
        store.handle_block_change(lamp, 0, AIR, &mut t),
        BlockChange::Applied {
            destination_id: DESTINATION_AIR,
            block_entity: None
        }
    );
}

#[test]
fn light_cache_is_shared_across_stores() {
    let cache = Arc::new(LightCache::new(256));
    let mut first = new_store(&cache);
    let mut second = new_store(&cache);
    let mut t = RecordingTransport::new();
    let pos = ChunkPos::new(0, 0);

    load(&mut first, pos, [air_section(), roofed_section()], &mut t);
    first.tick(&mut t, &false);
    assert_eq!(cache.len(), 1);

    load(&mut second, pos, [air_section(), roofed_section()], &mut t);
    second.tick(&mut t, &false);
    assert_eq!(cache.len(), 1);
    assert_eq!(first.sent_light(pos), second.sent_light(pos));
}

#[test]
fn unloading_clears_derived_state() {
    let cache = Arc::new(LightCache::new(256));
    let mut store = new_store(&cache);
    let mut t = RecordingTransport::new();
    let pos = ChunkPos::new(4, 0);

    load(&mut store, pos, [air_section(), air_section()], &mut t);
    store.tick(&mut t, &false);
    assert!(store.is_sent(pos));

    t.drain();
    store.set_center(-1, 0, &mut t);
    assert!(!store.is_sent(pos));
    assert!(store.sent_light(pos).is_none());
    assert!(store.is_empty());
    assert_eq!(t.drain().last(), Some(&Outbound::ForgetChunk(pos)));
}
