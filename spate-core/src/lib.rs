//! Spate Core - Swarm bridging primitives for the torrent HTTP gateway
//!
//! This crate provides the building blocks the gateway composes: torrent
//! identity and descriptor handling, the on-disk metadata cache, per-torrent
//! reference counting with grace-deferred teardown, and the trait boundary
//! to the torrent engine.

pub mod bencode;
pub mod cache;
pub mod config;
pub mod engine;
pub mod refs;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use cache::{CacheError, MetainfoCache};
pub use config::SpateConfig;
pub use engine::{ContentReader, EngineError, TorrentEngine, TorrentHandle};
pub use refs::{TorrentRef, TorrentRefs};
pub use torrent::{FileEntry, InfoHash, MetaInfo, MetainfoError, TorrentError};
