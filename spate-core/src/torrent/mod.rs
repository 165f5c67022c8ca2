//! Torrent identity and descriptor types.

pub mod metainfo;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_data;

use std::fmt;
use std::str::FromStr;

pub use metainfo::{FileEntry, MetaInfo, MetainfoError};

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary. This is the join key across
/// every component: swarm membership, reference counting, and the on-disk
/// metadata cache are all keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates an InfoHash from a 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Parses an InfoHash from its 40-character hex encoding.
    ///
    /// # Errors
    /// - `TorrentError::InvalidInfoHash` - Wrong length or non-hex characters
    pub fn from_hex(s: &str) -> Result<Self, TorrentError> {
        let raw = hex::decode(s).map_err(|e| TorrentError::InvalidInfoHash {
            reason: e.to_string(),
        })?;
        let hash: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| TorrentError::InvalidInfoHash {
                reason: format!("expected 20 bytes, got {}", raw.len()),
            })?;
        Ok(Self(hash))
    }

    /// Returns a reference to the underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Errors for torrent identity handling.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("invalid info hash: {reason}")]
    InvalidInfoHash { reason: String },
}
