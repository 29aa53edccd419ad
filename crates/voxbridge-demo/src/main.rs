//! Replays a synthetic session through the chunk store.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p voxbridge-demo -- --radius 4 --ticks 50`.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use voxbridge_config::{CliArgs, Config, default_config_dir};
use voxbridge_lighting::LightCache;
use voxbridge_voxel::ChunkPos;
use voxbridge_world::{BlockChange, ChunkStore, Outbound, RecordingTransport, TickReport};

use crate::server::SyntheticServer;

fn light_cache(config: &Config) -> LightCache {
    let entries = config.light.cache_entries;
    if config.light.worker_threads == 0 {
        return LightCache::new(entries);
    }
    LightCache::with_workers(entries, config.light.worker_threads).unwrap_or_else(|e| {
        warn!("Light workers unavailable ({e}), computing inline");
        LightCache::new(entries)
    })
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".voxbridge"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.world.validate() {
        eprintln!("{e}");
        std::process::exit(2);
    }

    let log_dir = config_dir.join("logs");
    voxbridge_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let mappings = match server::mappings() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Invalid demo mappings: {e}");
            std::process::exit(1);
        }
    };
    let cache = Arc::new(light_cache(&config));
    info!(
        cache_entries = cache.max_entries(),
        workers = cache.worker_threads(),
        "Light cache ready"
    );

    let mut store = ChunkStore::new(&config, mappings.clone(), mappings, Arc::clone(&cache));
    let mut transport = RecordingTransport::new();
    let server = SyntheticServer::new(0x5EED);

    // Announce every column in the render window.
    let radius = config.view.radius as i32;
    let bottom = config.world.min_y >> 4;
    let top = bottom + config.world.section_count() as i32;
    for x in -radius..=radius {
        for z in -radius..=radius {
            let pos = ChunkPos::new(x, z);
            // Only the sections the announcement leaves out are fetched.
            let Some(declared) = store
                .create_chunk(pos, 0, &mut transport)
                .map(|chunk| chunk.declared_non_empty() as i32)
            else {
                continue;
            };
            store.request_sub_chunks(pos, bottom + declared, top);
        }
    }
    store.set_player_position(8.5, 8.5);
    info!(columns = store.loaded_count(), requests = store.pending_requests(), "Session started");

    let mut totals = TickReport::default();
    let mut merged = 0usize;
    let mut rejected = 0usize;
    for tick in 0..args.ticks {
        // The player counts as spawned from the second tick on.
        let spawned = tick > 0;
        let report = store.tick(&mut transport, &spawned);
        totals.chunks_sent += report.chunks_sent;
        totals.light_updates_sent += report.light_updates_sent;
        totals.relights_unchanged += report.relights_unchanged;
        totals.sub_chunk_batches += report.sub_chunk_batches;

        for message in transport.drain() {
            let Outbound::SubChunkRequest(request) = message else {
                continue;
            };
            for pos in request.positions() {
                let (section, entities) = server.sub_chunk(pos);
                match store.merge_sub_chunk(pos, section, entities) {
                    Ok(()) => merged += 1,
                    Err(_) => rejected += 1,
                }
            }
        }

        if tick == args.ticks / 2 {
            let (pos, id) = server.roof_edit();
            match store.handle_block_change(pos, 0, id, &mut transport) {
                BlockChange::Applied { destination_id, .. } => {
                    info!(?pos, destination_id, "Roof placed");
                    store.send_chunk_next_tick(pos.chunk());
                }
                other => info!(?pos, ?other, "Roof edit not applied"),
            }
        }
    }

    info!(
        ticks = args.ticks,
        chunks_sent = totals.chunks_sent,
        light_updates = totals.light_updates_sent,
        unchanged_relights = totals.relights_unchanged,
        batches = totals.sub_chunk_batches,
        merged,
        rejected,
        cached_light = cache.len(),
        "Session finished"
    );
}
