//! Central manager for per-item decoded audio features and the combined
//! per-frame visualization vector.
//!
//! **Why**: the render loop asks for a visualization vector on every
//! displayed frame and must never block on a decode or see an error.
//! Decodes therefore run on a small worker pool; completions flow back
//! over a channel and are applied when the owner pumps them.
//!
//! # Concurrency
//!
//! The store is single-owner (`&mut self` API). Workers only decode and
//! send; every cache mutation happens inside the store's own methods.
//! Per-id loads are serialized by the in-flight map, and a per-id
//! generation counter discards completions that raced with a removal, so
//! a removed-then-reused id can never resurrect stale data.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::features::{AudioFeatures, DecodeError, Decoder};
use crate::frame_cache::FrameCache;
use crate::item::AudioItem;
use crate::task_queue::TaskQueue;
use crate::ttl_cache::TtlCache;
use crate::visualize;

/// Tuning knobs for [`AudioStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Output frame rate used for frame/time conversion.
    pub fps: f64,
    /// Buckets per combined vector.
    pub num_samples: usize,
    /// Feature entries kept before oldest-touch eviction.
    pub max_entries: usize,
    /// Feature entry lifetime since last touch.
    pub entry_ttl: Duration,
    /// Combined vectors memoized before insertion-order eviction.
    pub frame_cache_capacity: usize,
    /// Decode worker threads.
    pub workers: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            num_samples: 512,
            max_entries: 10,
            entry_ttl: Duration::from_secs(5 * 60),
            frame_cache_capacity: 100,
            workers: TaskQueue::DEFAULT_CONCURRENCY,
        }
    }
}

/// Decode completion delivered by a worker.
#[derive(Debug)]
struct LoadedFeatures {
    id: String,
    generation: u64,
    result: Result<AudioFeatures, DecodeError>,
}

/// Persisted snapshot of the active item list.
#[derive(Debug, Serialize, Deserialize)]
struct StoreState {
    revision: u64,
    fps: f64,
    items: Vec<AudioItem>,
}

pub struct AudioStore {
    config: StoreConfig,
    decoder: Arc<dyn Decoder>,

    items: Vec<AudioItem>,
    items_revision: Option<u64>,

    features: TtlCache<String, Arc<AudioFeatures>>,
    in_flight: HashMap<String, u64>,
    generations: HashMap<String, u64>,

    frame_cache: FrameCache,

    queue: TaskQueue,
    loaded_tx: Sender<LoadedFeatures>,
    loaded_rx: Receiver<LoadedFeatures>,
}

impl AudioStore {
    /// Create a store with its own worker pool. Dropping the store joins
    /// the workers; in-flight decodes run to completion and are discarded.
    pub fn new(config: StoreConfig, decoder: Arc<dyn Decoder>) -> Self {
        let (loaded_tx, loaded_rx) = unbounded();
        let queue = TaskQueue::new(config.workers);

        info!(
            "audio store: {} worker(s), {} feature slot(s), ttl {:?}",
            config.workers, config.max_entries, config.entry_ttl
        );

        Self {
            features: TtlCache::new(config.max_entries, config.entry_ttl),
            frame_cache: FrameCache::new(config.frame_cache_capacity),
            items: Vec::new(),
            items_revision: None,
            in_flight: HashMap::new(),
            generations: HashMap::new(),
            queue,
            loaded_tx,
            loaded_rx,
            decoder,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The active item set, as last communicated.
    pub fn items(&self) -> &[AudioItem] {
        &self.items
    }

    /// Update the output frame rate. Invalidates memoized frames since the
    /// frame/time mapping changed under them.
    pub fn set_fps(&mut self, fps: f64) {
        if fps == self.config.fps {
            return;
        }
        debug!("fps {} -> {}", self.config.fps, fps);
        self.config.fps = fps;
        self.frame_cache.clear();
    }

    /// Replace the active item set.
    ///
    /// `revision` is the caller's version counter for the supplied list;
    /// an unchanged revision (or deep-equal contents) is a no-op, so
    /// frequent re-delivery from the UI costs nothing. Otherwise removals
    /// are fully applied before any new decode is scheduled, every added
    /// id with a non-empty source gets a fire-and-forget decode, and the
    /// frame memo is cleared once.
    pub fn set_items(&mut self, items: Vec<AudioItem>, revision: u64) {
        if self.items_revision == Some(revision) {
            debug!("set_items: revision {revision} unchanged, skipping");
            return;
        }
        if items == self.items {
            debug!("set_items: contents unchanged, skipping");
            self.items_revision = Some(revision);
            return;
        }

        let new_ids: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let removed: Vec<String> = self
            .items
            .iter()
            .filter(|i| !new_ids.contains(i.id.as_str()))
            .map(|i| i.id.clone())
            .collect();
        let current_ids: HashSet<String> = self.items.iter().map(|i| i.id.clone()).collect();
        let added = items
            .iter()
            .filter(|i| !current_ids.contains(&i.id))
            .count();

        debug!(
            "set_items: revision {revision}, {} item(s), +{added} -{}",
            items.len(),
            removed.len()
        );

        // Removals first: a reused id must see its eviction before the
        // fresh load is scheduled
        for id in &removed {
            self.evict_entry(id);
        }
        for item in &items {
            if !current_ids.contains(&item.id) && !item.src.is_empty() {
                self.request_load(&item.id, &item.src);
            }
        }

        self.items = items;
        self.items_revision = Some(revision);
        self.frame_cache.clear();
    }

    /// Re-apply [`Self::update_item`] for every supplied item that differs
    /// from the stored item with the same id.
    pub fn validate_update_items(&mut self, items: &[AudioItem]) {
        let mut updated = 0usize;
        for item in items {
            let changed = self
                .items
                .iter()
                .any(|current| current.id == item.id && current != item);
            if changed {
                self.update_item(item.clone());
                updated += 1;
            }
        }
        if updated > 0 {
            debug!("validate_update_items: {updated} item(s) refreshed");
        }
    }

    /// Replace a stored item. A source change invalidates the old features
    /// and schedules a fresh decode under a new generation.
    pub fn update_item(&mut self, item: AudioItem) {
        let Some(pos) = self.items.iter().position(|i| i.id == item.id) else {
            debug!("update_item: {} not active, ignoring", item.id);
            return;
        };
        if self.items[pos].src != item.src {
            self.evict_entry(&item.id);
            if !item.src.is_empty() {
                self.request_load(&item.id, &item.src);
            }
        }
        self.items[pos] = item;
        self.frame_cache.clear();
    }

    /// Drop an item and its cached features. An in-flight decode is not
    /// aborted; its completion is discarded by the generation check.
    pub fn remove_item(&mut self, id: &str) {
        self.evict_entry(id);
        self.items.retain(|i| i.id != id);
        self.frame_cache.clear();
    }

    /// Combined visualization vector for `frame`. Never blocks, never
    /// fails: items whose features are missing, still decoding, or
    /// unavailable contribute silence.
    pub fn features_for_frame(&mut self, frame: u32) -> Vec<f32> {
        self.process_loaded();

        if let Some(cached) = self.frame_cache.get(frame) {
            return cached.to_vec();
        }

        let n = self.config.num_samples;
        let fps = self.config.fps;
        let f = frame as f64;

        let mut sources: Vec<Vec<f32>> = Vec::with_capacity(self.items.len());
        for idx in 0..self.items.len() {
            let item = &self.items[idx];
            let from_frame = item.display.from as f64 * fps / 1000.0;
            let to_frame = item.display.to as f64 * fps / 1000.0;

            if !item.display.is_valid() || f < from_frame || f > to_frame {
                sources.push(vec![0.0; n]);
                continue;
            }

            let frame_time = f - from_frame + item.trim_from as f64 * fps / 1000.0;
            let window = match self.features.get(&item.id) {
                // Lookup refreshes recency, keeping playing items warm
                Some(features) => visualize::sample_window(features, frame_time, fps, n),
                None => vec![0.0; n],
            };
            sources.push(window);
        }

        let combined = visualize::combine_peaks(n, &sources);
        self.frame_cache.insert(frame, combined.clone());
        combined
    }

    /// Apply decode completions delivered since the last pump.
    pub fn process_loaded(&mut self) {
        while let Ok(loaded) = self.loaded_rx.try_recv() {
            // Only the marker belonging to this load may be cleared; a
            // resurrected id may already have a newer one
            if self.in_flight.get(&loaded.id) == Some(&loaded.generation) {
                self.in_flight.remove(&loaded.id);
            }

            match loaded.result {
                Ok(features) => {
                    let current = self.generations.get(&loaded.id).copied().unwrap_or(0);
                    let active = self.items.iter().any(|i| i.id == loaded.id);
                    if loaded.generation != current || !active {
                        debug!("discarding stale decode for {}", loaded.id);
                        continue;
                    }
                    debug!(
                        "features ready for {} ({} samples @ {} Hz)",
                        loaded.id,
                        features.samples.len(),
                        features.sample_rate
                    );
                    self.features.set(loaded.id, Arc::new(features));
                    self.features.cleanup();
                }
                Err(DecodeError::NoAudioTrack) => {
                    debug!("{}: no audio track, treating as silent", loaded.id);
                }
                Err(e) => {
                    // No entry, no marker: the id stays eligible for a
                    // retry on the next relevant set_items/update_item
                    warn!("decode failed for {}: {e}", loaded.id);
                }
            }
        }
    }

    /// Whether decoded features are currently cached for `id`.
    pub fn has_features(&mut self, id: &str) -> bool {
        self.process_loaded();
        self.features.has(id)
    }

    /// Number of feature entries currently cached.
    pub fn cached_count(&self) -> usize {
        self.features.len()
    }

    /// True when no decode is queued, running, or waiting to be applied.
    pub fn idle(&self) -> bool {
        self.queue.pending() == 0 && self.loaded_rx.is_empty()
    }

    /// Persist the active item list as a JSON snapshot.
    pub fn save_state(&self, path: &Path) -> Result<()> {
        let state = StoreState {
            revision: self.items_revision.unwrap_or(0),
            fps: self.config.fps,
            items: self.items.clone(),
        };
        let json = serde_json::to_string_pretty(&state).context("serialize store state")?;
        std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        info!(
            "store state saved to {} ({} item(s))",
            path.display(),
            state.items.len()
        );
        Ok(())
    }

    /// Restore an item list saved by [`Self::save_state`]. Decodes are
    /// scheduled as for any other `set_items` call. Returns the item count.
    pub fn load_state(&mut self, path: &Path) -> Result<usize> {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let state: StoreState = serde_json::from_str(&json).context("parse store state")?;
        let count = state.items.len();

        self.set_fps(state.fps);
        // Force application even if the saved revision collides
        self.items_revision = None;
        self.set_items(state.items, state.revision);

        info!("store state restored from {} ({count} item(s))", path.display());
        Ok(count)
    }

    /// Evict an id's features and invalidate any in-flight decode for it.
    fn evict_entry(&mut self, id: &str) {
        self.features.remove(id);
        *self.generations.entry(id.to_string()).or_insert(0) += 1;
        self.in_flight.remove(id);
    }

    /// Schedule a background decode for `id` unless one is in flight or
    /// its features are already cached.
    fn request_load(&mut self, id: &str, src: &str) {
        if self.in_flight.contains_key(id) {
            debug!("load for {id} already in flight");
            return;
        }
        if self.features.get(id).is_some() {
            // Refreshed by the lookup; nothing to reload
            return;
        }

        let generation = self.generations.get(id).copied().unwrap_or(0);
        self.in_flight.insert(id.to_string(), generation);

        let decoder = Arc::clone(&self.decoder);
        let tx = self.loaded_tx.clone();
        let id = id.to_string();
        let src = src.to_string();

        debug!("scheduling decode for {id} ({src})");
        self.queue.execute(move || {
            let result = decoder.decode(&src);
            // A closed channel means the store is gone; nothing to report
            let _ = tx.send(LoadedFeatures {
                id,
                generation,
                result,
            });
            Ok(())
        });
    }
}
