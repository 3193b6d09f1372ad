//! WAVECACHE - frame-indexed audio visualization cache
//!
//! Decodes audio sources for timeline items in the background, keeps the
//! decoded waveforms in a bounded, TTL-aware cache, and serves a combined
//! per-frame visualization vector to the render loop without ever blocking
//! or failing it.
//!
//! The owner drives everything through an explicit [`AudioStore`] instance:
//! deliver the active item set with [`AudioStore::set_items`], then ask for
//! [`AudioStore::features_for_frame`] on every displayed frame. Items whose
//! audio is still decoding, absent, or undecodable contribute silence.

pub mod cleanup;
pub mod features;
pub mod frame_cache;
pub mod item;
pub mod store;
pub mod task_queue;
pub mod ttl_cache;
pub mod visualize;

// Re-export the public surface
pub use cleanup::CleanupRegistry;
pub use features::{AudioFeatures, DecodeError, Decoder, SymphoniaDecoder};
pub use frame_cache::FrameCache;
pub use item::{AudioItem, TimeRange};
pub use store::{AudioStore, StoreConfig};
pub use task_queue::TaskQueue;
pub use ttl_cache::TtlCache;
