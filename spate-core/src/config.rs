//! Centralized configuration for Spate.
//!
//! All tunable parameters live here to avoid hard-coded values scattered
//! throughout the codebase.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Spate components.
#[derive(Debug, Clone, Default)]
pub struct SpateConfig {
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub serve: ServeConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address the gateway binds to.
    pub listen_addr: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([127, 0, 0, 1], 8080).into(),
        }
    }
}

/// Metadata cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one descriptor file per torrent.
    pub torrents_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            torrents_dir: PathBuf::from("torrents"),
        }
    }
}

/// Content-serving behavior.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Prefetch window configured on every streaming reader. Swarm pieces
    /// arrive asynchronously; a generous window hides fetch latency.
    pub read_ahead: u64,
    /// How long an idle torrent stays joined after its last reference is
    /// gone. `None` disables reference counting: torrents are never
    /// auto-dropped.
    pub torrent_grace: Option<Duration>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            read_ahead: 48 << 20, // 48 MiB
            torrent_grace: Some(Duration::from_secs(60)),
        }
    }
}
