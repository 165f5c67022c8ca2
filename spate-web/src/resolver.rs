//! Per-request torrent resolution.
//!
//! Maps an inbound request to a live engine handle: extracts the info hash
//! (query parameter or descriptor body), attaches this request's reference
//! before the engine join, seeds new joins from the request body or the
//! metadata cache, and starts the persistence watcher for handles this
//! request created.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use spate_core::{InfoHash, MetaInfo, TorrentHandle, TorrentRef};
use tracing::{debug, warn};

use crate::error::HttpError;
use crate::persist;
use crate::server::AppState;

/// A torrent resolved for one request.
///
/// Carries the shared handle plus this request's counted reference. The
/// reference's grace-deferred release is scheduled when the resolution is
/// dropped, so it must ride the response body stream and only drop once the
/// body is fully written or abandoned.
pub struct ResolvedTorrent {
    handle: Arc<dyn TorrentHandle>,
    _release: Option<ReleaseGuard>,
}

impl ResolvedTorrent {
    pub fn handle(&self) -> &Arc<dyn TorrentHandle> {
        &self.handle
    }
}

struct ReleaseGuard {
    torrent_ref: Option<TorrentRef>,
    grace: Duration,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(torrent_ref) = self.torrent_ref.take() {
            torrent_ref.release_after(self.grace);
        }
    }
}

/// Resolves a request to a torrent handle.
///
/// `ih` is the hex info-hash query parameter; when absent, `body` must hold
/// a bencoded torrent descriptor. The body bytes are only read, never
/// consumed, so they remain available to the caller.
///
/// # Errors
/// - `HttpError::InvalidInfoHash` / `InvalidDescriptor` - Malformed input,
///   rejected before any engine interaction
/// - `HttpError::Engine` - Join failure; the acquired reference is released
///   immediately on this path
pub async fn resolve(
    state: &AppState,
    ih: Option<&str>,
    body: &Bytes,
) -> Result<ResolvedTorrent, HttpError> {
    let (info_hash, body_metainfo) = match ih {
        Some(hex) => {
            let hash = InfoHash::from_hex(hex).map_err(|e| HttpError::InvalidInfoHash {
                reason: e.to_string(),
            })?;
            (hash, None)
        }
        None => {
            let mi = MetaInfo::parse(body).map_err(|e| HttpError::InvalidDescriptor {
                reason: e.to_string(),
            })?;
            (mi.info_hash(), Some(mi))
        }
    };

    // The reference is acquired before the join so the handle is never
    // transiently unreferenced between creation and attachment.
    let grace = state.config.serve.torrent_grace;
    let torrent_ref = grace.map(|_| state.refs.acquire(info_hash));

    let (handle, is_new) = match state.engine.add_by_info_hash(info_hash).await {
        Ok(added) => added,
        Err(e) => {
            if let Some(torrent_ref) = torrent_ref {
                torrent_ref.release_now();
            }
            return Err(HttpError::Engine(e));
        }
    };

    let release = match (torrent_ref, grace) {
        (Some(torrent_ref), Some(grace)) => {
            let engine = state.engine.clone();
            torrent_ref.bind_close(move || {
                tokio::spawn(async move { engine.drop_torrent(info_hash).await });
            });
            Some(ReleaseGuard {
                torrent_ref: Some(torrent_ref),
                grace,
            })
        }
        _ => None,
    };

    if is_new {
        debug!("joined torrent {info_hash}");

        let seed = match body_metainfo {
            Some(mi) => Some(mi),
            None => state.cache.load(info_hash).await,
        };
        if let Some(mi) = seed {
            handle.set_trackers(mi.announce_list.clone()).await;
            if let Err(e) = handle.set_metadata_bytes(mi.info_bytes.clone()).await {
                warn!("seeding metadata for {info_hash} failed: {e}");
            }
        }

        // Not tied to this request; metadata may arrive long after it ends.
        let _ = persist::spawn_metainfo_persister(handle.clone(), state.cache.clone());
    }

    Ok(ResolvedTorrent {
        handle,
        _release: release,
    })
}
