//! On-disk metadata cache.
//!
//! One descriptor file per torrent, named by the info-hash's hex encoding,
//! under a fixed root. The cache is an optimization: a miss (including any
//! read failure) never blocks serving, it only costs a swarm-side metadata
//! exchange.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::torrent::{InfoHash, MetaInfo};

/// Errors raised while persisting a cache entry.
///
/// Read-side failures are never surfaced; they degrade to a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Flat file store mapping info hashes to torrent descriptors.
#[derive(Debug, Clone)]
pub struct MetainfoCache {
    root: PathBuf,
}

impl MetainfoCache {
    /// Creates a cache rooted at `root`. The directory is created lazily on
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, info_hash: InfoHash) -> PathBuf {
        self.root.join(format!("{info_hash}.torrent"))
    }

    /// Loads the cached descriptor for `info_hash`, if one exists.
    ///
    /// A missing entry is a silent miss. Any other failure (unreadable file,
    /// undecodable contents) is logged and also reported as a miss.
    pub async fn load(&self, info_hash: InfoHash) -> Option<MetaInfo> {
        let path = self.entry_path(info_hash);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("error reading cached metainfo {}: {e}", path.display());
                return None;
            }
        };

        match MetaInfo::parse(&data) {
            Ok(mi) => Some(mi),
            Err(e) => {
                warn!("error decoding cached metainfo {}: {e}", path.display());
                None
            }
        }
    }

    /// Saves a descriptor, overwriting any existing entry for the hash.
    ///
    /// Concurrent saves for the same hash are last-writer-wins. Metadata is
    /// content-addressed, so every legitimate writer produces identical
    /// bytes and the outcome is order-independent.
    ///
    /// # Errors
    /// - `CacheError::Io` - Directory creation or file write failed
    pub async fn save(&self, info_hash: InfoHash, metainfo: &MetaInfo) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.entry_path(info_hash), metainfo.to_bytes()).await?;
        Ok(())
    }
}
