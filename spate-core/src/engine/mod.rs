//! Trait boundary to the torrent engine.
//!
//! The engine (swarm join, peer wire, piece scheduling, on-disk storage) is
//! an external collaborator. This module pins down the capability the
//! gateway consumes: join a torrent by info hash, observe metadata/closure
//! signals, enumerate files, and read content through a seekable,
//! read-ahead-configurable reader.

pub mod reader;
pub mod simulation;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::torrent::{FileEntry, InfoHash, MetaInfo};

/// Errors surfaced by the engine capability.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("metadata rejected: {reason}")]
    InvalidMetadata { reason: String },

    #[error("metadata not yet available")]
    MetadataNotAvailable,

    #[error("engine is shutting down")]
    Shutdown,
}

/// The torrent engine capability consumed by the gateway.
#[async_trait]
pub trait TorrentEngine: Send + Sync + 'static {
    /// Joins (or re-uses) the torrent identified by `info_hash`.
    ///
    /// Returns the shared handle and whether this call created a new join,
    /// as opposed to returning a handle already live in the engine.
    ///
    /// # Errors
    /// - `EngineError::Shutdown` - Engine no longer accepts joins
    async fn add_by_info_hash(
        &self,
        info_hash: InfoHash,
    ) -> Result<(Arc<dyn TorrentHandle>, bool), EngineError>;

    /// Drops the torrent from the engine. Idempotent: dropping an unknown
    /// or already-dropped hash is a no-op.
    async fn drop_torrent(&self, info_hash: InfoHash);
}

/// A joined (but possibly metadata-less) torrent.
///
/// Shared by every request referencing the same info hash; its lifetime is
/// governed by the reference tracker, never by a single request.
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    /// Resolves once the torrent's metadata is available. Completes
    /// immediately if it already is.
    async fn metadata_ready(&self);

    /// Resolves once the torrent has been dropped from the engine.
    async fn closed(&self);

    /// Files within the torrent. Valid only once metadata is present;
    /// empty before then.
    fn files(&self) -> Vec<FileEntry>;

    /// Total content length in bytes. Zero before metadata is present.
    fn total_length(&self) -> u64;

    /// Display name of the torrent. Falls back to the hex info hash before
    /// metadata is present.
    fn name(&self) -> String;

    /// Opens a new streaming reader over the torrent's content.
    ///
    /// The reader presents the swarm's out-of-order piece arrival as
    /// sequential bytes; a read past the downloaded frontier blocks until
    /// the data exists or the torrent closes. Resources are returned when
    /// the reader is dropped.
    fn new_reader(&self) -> Box<dyn ContentReader>;

    /// Merges tracker tiers into the handle.
    async fn set_trackers(&self, trackers: Vec<Vec<String>>);

    /// Supplies the raw info dictionary bytes, short-circuiting the
    /// swarm-side metadata exchange.
    ///
    /// # Errors
    /// - `EngineError::InvalidMetadata` - Bytes do not hash to this torrent's
    ///   info hash, or do not decode as an info dictionary
    async fn set_metadata_bytes(&self, info_bytes: Bytes) -> Result<(), EngineError>;

    /// Serializes the current descriptor (trackers + info bytes).
    ///
    /// # Errors
    /// - `EngineError::MetadataNotAvailable` - Called before metadata arrived
    fn metainfo(&self) -> Result<MetaInfo, EngineError>;
}

/// Sequential, seekable reader over torrent content.
pub trait ContentReader: AsyncRead + AsyncSeek + Send + Unpin {
    /// Configures the prefetch window the engine keeps ahead of the read
    /// position. A generous window smooths over swarm fetch latency.
    fn set_read_ahead(&mut self, _bytes: u64) {}
}
