//! Spate Web - HTTP gateway to BitTorrent swarms
//!
//! Exposes swarm content as ordinary HTTP resources: the resolver binds each
//! request to a live torrent handle, the content server streams byte ranges
//! out of the swarm, and a background watcher persists freshly learned
//! metadata across restarts.

pub mod content;
pub mod error;
pub mod persist;
pub mod range;
pub mod resolver;
pub mod server;

pub use error::HttpError;
pub use server::{AppState, router, run_server};
