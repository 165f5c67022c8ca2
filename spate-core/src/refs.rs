//! Per-torrent reference counting with grace-deferred release.
//!
//! Every HTTP request referencing a torrent holds one reference for its
//! duration; the engine-side drop only happens once the count returns to
//! zero and a grace period has elapsed with no new reference arriving. This
//! absorbs bursts of back-to-back requests for the same content without
//! repeatedly joining and leaving the swarm.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::torrent::InfoHash;

type CloseAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Entry {
    count: usize,
    close: Option<CloseAction>,
}

/// Process-wide table of live torrent references.
///
/// Created once at startup and injected into the resolver; cheap to clone.
#[derive(Clone, Default)]
pub struct TorrentRefs {
    table: Arc<Mutex<HashMap<InfoHash, Entry>>>,
}

impl TorrentRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a counted reference for `info_hash`.
    ///
    /// Acquisition must happen before the corresponding engine join, so a
    /// freshly created handle is never transiently unreferenced. An acquire
    /// while a deferred release is pending keeps the count positive and
    /// thereby supersedes it.
    pub fn acquire(&self, info_hash: InfoHash) -> TorrentRef {
        self.table.lock().entry(info_hash).or_default().count += 1;
        TorrentRef {
            refs: self.clone(),
            info_hash,
            released: false,
        }
    }

    /// Number of live references for `info_hash`. Test and introspection aid.
    pub fn count(&self, info_hash: InfoHash) -> usize {
        self.table.lock().get(&info_hash).map_or(0, |e| e.count)
    }

    fn release(&self, info_hash: InfoHash) {
        let close = {
            let mut table = self.table.lock();
            let Some(entry) = table.get_mut(&info_hash) else {
                return;
            };
            entry.count -= 1;
            if entry.count == 0 {
                table.remove(&info_hash).and_then(|entry| entry.close)
            } else {
                None
            }
        };

        // Invoked outside the lock; the action may call back into the engine.
        if let Some(close) = close {
            debug!("last reference to {info_hash} released, closing");
            close();
        }
    }
}

/// A counted handle-to-info-hash binding.
///
/// Dropping an unreleased reference releases it immediately; the normal
/// request path calls [`TorrentRef::release_after`] instead.
pub struct TorrentRef {
    refs: TorrentRefs,
    info_hash: InfoHash,
    released: bool,
}

impl TorrentRef {
    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// Binds the action to run when the hash's count returns to zero.
    ///
    /// The action runs at most once per table entry; a later bind replaces
    /// an earlier one. Actions must tolerate running after the underlying
    /// resource is already gone (the engine's drop is idempotent).
    pub fn bind_close(&self, close: impl FnOnce() + Send + 'static) {
        if let Some(entry) = self.refs.table.lock().get_mut(&self.info_hash) {
            entry.close = Some(Box::new(close));
        }
    }

    /// Schedules this reference's release `grace` from now.
    ///
    /// The count is decremented only when the timer fires, so the entry
    /// survives the whole window and any new acquire within it keeps the
    /// resource alive.
    pub fn release_after(mut self, grace: Duration) {
        self.released = true;
        let refs = self.refs.clone();
        let info_hash = self.info_hash;

        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                refs.release(info_hash);
            });
        } else {
            refs.release(info_hash);
        }
    }

    /// Releases immediately, skipping the grace period.
    ///
    /// Used on error paths where the reference never ended up backing a
    /// served request (e.g. the engine join failed).
    pub fn release_now(mut self) {
        self.released = true;
        self.refs.release(self.info_hash);
    }
}

impl Drop for TorrentRef {
    fn drop(&mut self) {
        if !self.released {
            self.refs.release(self.info_hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn hash(byte: u8) -> InfoHash {
        InfoHash::new([byte; 20])
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let clone = fired.clone();
        (fired, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_fires_only_after_grace() {
        let refs = TorrentRefs::new();
        let (fired, close) = counter();

        let torrent_ref = refs.acquire(hash(1));
        torrent_ref.bind_close(close);
        torrent_ref.release_after(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(refs.count(hash(1)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reacquire_within_grace_supersedes_release() {
        let refs = TorrentRefs::new();
        let (fired, close) = counter();

        let first = refs.acquire(hash(2));
        first.bind_close(close);
        first.release_after(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        let second = refs.acquire(hash(2));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        second.release_after(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_hash_closes_after_last_reference() {
        let refs = TorrentRefs::new();
        let (fired, close) = counter();

        let refs_held: Vec<_> = (0..3).map(|_| refs.acquire(hash(3))).collect();
        refs_held[0].bind_close(close);
        assert_eq!(refs.count(hash(3)), 3);

        let grace = Duration::from_secs(60);
        for (i, torrent_ref) in refs_held.into_iter().enumerate() {
            tokio::time::sleep(Duration::from_secs(i as u64)).await;
            torrent_ref.release_after(grace);
        }

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0); // last release still pending

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_now_skips_grace() {
        let refs = TorrentRefs::new();
        let (fired, close) = counter();

        let torrent_ref = refs.acquire(hash(4));
        torrent_ref.bind_close(close);
        torrent_ref.release_now();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_is_immediate() {
        let refs = TorrentRefs::new();
        let (fired, close) = counter();

        {
            let torrent_ref = refs.acquire(hash(5));
            torrent_ref.bind_close(close);
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(refs.count(hash(5)), 0);
    }
}
