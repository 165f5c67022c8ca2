//! Background persistence of freshly learned metadata.

use std::sync::Arc;

use spate_core::{MetainfoCache, TorrentHandle};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns the persistence watcher for a newly created handle.
///
/// The task blocks until the torrent's metadata is available or the handle
/// is closed, whichever comes first, then writes the descriptor to the
/// cache. It is deliberately decoupled from the spawning request: metadata
/// may arrive long after that client has disconnected. Persistence is
/// best-effort; failures are logged, never propagated.
pub fn spawn_metainfo_persister(
    handle: Arc<dyn TorrentHandle>,
    cache: MetainfoCache,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = handle.closed() => {}
            _ = handle.metadata_ready() => {}
        }

        // Closed before metadata ever arrived: nothing to persist.
        let metainfo = match handle.metainfo() {
            Ok(mi) => mi,
            Err(_) => return,
        };

        let info_hash = handle.info_hash();
        match cache.save(info_hash, &metainfo).await {
            Ok(()) => debug!("persisted metainfo for {info_hash}"),
            Err(e) => warn!("error saving metainfo for {info_hash}: {e}"),
        }
    })
}
