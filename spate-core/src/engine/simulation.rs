//! In-process torrent engine for development and tests.
//!
//! Implements the [`TorrentEngine`] capability over in-memory state: content
//! is supplied programmatically, metadata and closure are watch-channel
//! signals, and reads past the supplied frontier block exactly like reads
//! past the downloaded frontier of a real swarm.

use std::collections::HashMap;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use futures::future::BoxFuture;
use bytes::Bytes;
use parking_lot::Mutex;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio::sync::watch;

use super::{ContentReader, EngineError, TorrentEngine, TorrentHandle};
use crate::torrent::metainfo::ContentLayout;
use crate::torrent::{FileEntry, InfoHash, MetaInfo};

/// Engine whose torrents live entirely in memory.
#[derive(Default)]
pub struct SimulatedEngine {
    torrents: Mutex<HashMap<InfoHash, Arc<SimulatedTorrent>>>,
    joins: AtomicUsize,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of joins that created a new torrent. Test aid.
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    /// Returns the concrete handle for a joined torrent. Test aid.
    pub fn torrent(&self, info_hash: InfoHash) -> Option<Arc<SimulatedTorrent>> {
        self.torrents.lock().get(&info_hash).cloned()
    }
}

#[async_trait]
impl TorrentEngine for SimulatedEngine {
    async fn add_by_info_hash(
        &self,
        info_hash: InfoHash,
    ) -> Result<(Arc<dyn TorrentHandle>, bool), EngineError> {
        let mut torrents = self.torrents.lock();
        if let Some(existing) = torrents.get(&info_hash) {
            return Ok((existing.clone(), false));
        }

        let handle = Arc::new(SimulatedTorrent::new(info_hash));
        torrents.insert(info_hash, handle.clone());
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok((handle, true))
    }

    async fn drop_torrent(&self, info_hash: InfoHash) {
        if let Some(handle) = self.torrents.lock().remove(&info_hash) {
            handle.close();
        }
    }
}

struct TorrentState {
    announce_list: Vec<Vec<String>>,
    info_bytes: Option<Bytes>,
    layout: Option<ContentLayout>,
    content: Bytes,
}

/// An in-memory torrent joined to a [`SimulatedEngine`].
pub struct SimulatedTorrent {
    info_hash: InfoHash,
    state: Arc<Mutex<TorrentState>>,
    meta_tx: watch::Sender<bool>,
    closed_tx: watch::Sender<bool>,
    frontier_tx: watch::Sender<u64>,
}

impl SimulatedTorrent {
    fn new(info_hash: InfoHash) -> Self {
        let (meta_tx, _) = watch::channel(false);
        let (closed_tx, _) = watch::channel(false);
        let (frontier_tx, _) = watch::channel(0);
        Self {
            info_hash,
            state: Arc::new(Mutex::new(TorrentState {
                announce_list: Vec::new(),
                info_bytes: None,
                layout: None,
                content: Bytes::new(),
            })),
            meta_tx,
            closed_tx,
            frontier_tx,
        }
    }

    /// Makes the torrent's full content available to readers.
    pub fn supply_content(&self, content: Bytes) {
        let frontier = content.len() as u64;
        self.state.lock().content = content;
        let _ = self.frontier_tx.send(frontier);
    }

    /// Marks the torrent closed, waking all waiters and blocked readers.
    pub fn close(&self) {
        let _ = self.closed_tx.send(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    pub fn has_metadata(&self) -> bool {
        *self.meta_tx.borrow()
    }
}

#[async_trait]
impl TorrentHandle for SimulatedTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    async fn metadata_ready(&self) {
        let mut rx = self.meta_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn files(&self) -> Vec<FileEntry> {
        self.state
            .lock()
            .layout
            .as_ref()
            .map(|layout| layout.files.clone())
            .unwrap_or_default()
    }

    fn total_length(&self) -> u64 {
        self.state
            .lock()
            .layout
            .as_ref()
            .map_or(0, |layout| layout.total_length)
    }

    fn name(&self) -> String {
        self.state
            .lock()
            .layout
            .as_ref()
            .map_or_else(|| self.info_hash.to_string(), |layout| layout.name.clone())
    }

    fn new_reader(&self) -> Box<dyn ContentReader> {
        Box::new(SimulatedReader {
            state: self.state.clone(),
            frontier_rx: self.frontier_tx.subscribe(),
            closed_rx: self.closed_tx.subscribe(),
            pos: 0,
            wait: None,
        })
    }

    async fn set_trackers(&self, trackers: Vec<Vec<String>>) {
        let mut state = self.state.lock();
        for tier in trackers {
            if !state.announce_list.contains(&tier) {
                state.announce_list.push(tier);
            }
        }
    }

    async fn set_metadata_bytes(&self, info_bytes: Bytes) -> Result<(), EngineError> {
        let mut hasher = Sha1::new();
        hasher.update(&info_bytes);
        let hash = InfoHash::new(hasher.finalize().into());
        if hash != self.info_hash {
            return Err(EngineError::InvalidMetadata {
                reason: format!("info bytes hash to {hash}, expected {}", self.info_hash),
            });
        }

        let layout = MetaInfo {
            announce_list: Vec::new(),
            info_bytes: info_bytes.clone(),
        }
        .content_layout()
        .map_err(|e| EngineError::InvalidMetadata {
            reason: e.to_string(),
        })?;

        {
            let mut state = self.state.lock();
            state.info_bytes = Some(info_bytes);
            state.layout = Some(layout);
        }
        let _ = self.meta_tx.send(true);
        Ok(())
    }

    fn metainfo(&self) -> Result<MetaInfo, EngineError> {
        let state = self.state.lock();
        let info_bytes = state
            .info_bytes
            .clone()
            .ok_or(EngineError::MetadataNotAvailable)?;
        Ok(MetaInfo {
            announce_list: state.announce_list.clone(),
            info_bytes,
        })
    }
}

type WaitFuture = BoxFuture<'static, bool>;

/// Reader over a simulated torrent's content.
///
/// Reads past the supplied frontier park until more content arrives or the
/// torrent closes, mirroring a real engine reader blocked on swarm data.
struct SimulatedReader {
    state: Arc<Mutex<TorrentState>>,
    frontier_rx: watch::Receiver<u64>,
    closed_rx: watch::Receiver<bool>,
    pos: u64,
    wait: Option<WaitFuture>,
}

impl AsyncRead for SimulatedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if let Some(wait) = &mut this.wait {
                let data_arrived = ready!(wait.as_mut().poll(cx));
                this.wait = None;
                if !data_arrived {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::Interrupted,
                        "torrent closed",
                    )));
                }
            }

            let (content, total) = {
                let state = this.state.lock();
                (
                    state.content.clone(),
                    state.layout.as_ref().map(|layout| layout.total_length),
                )
            };

            if let Some(total) = total
                && this.pos >= total
            {
                return Poll::Ready(Ok(()));
            }

            let available = content.len() as u64;
            if this.pos < available {
                let take =
                    usize::min(buf.remaining(), (available - this.pos) as usize);
                let start = this.pos as usize;
                buf.put_slice(&content[start..start + take]);
                this.pos += take as u64;
                return Poll::Ready(Ok(()));
            }

            if *this.closed_rx.borrow() {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "torrent closed",
                )));
            }

            let mut frontier_rx = this.frontier_rx.clone();
            let mut closed_rx = this.closed_rx.clone();
            let past = this.pos;
            this.wait = Some(Box::pin(async move {
                tokio::select! {
                    frontier = frontier_rx.wait_for(|frontier| *frontier > past) => frontier.is_ok(),
                    _ = closed_rx.wait_for(|closed| *closed) => false,
                }
            }));
        }
    }
}

impl AsyncSeek for SimulatedReader {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let total = this
            .state
            .lock()
            .layout
            .as_ref()
            .map(|layout| layout.total_length);

        let target = match position {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => i128::from(this.pos) + i128::from(offset),
            SeekFrom::End(offset) => {
                let total = total.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "length not yet known")
                })?;
                i128::from(total) + i128::from(offset)
            }
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }

        this.pos = u64::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek overflow"))?;
        this.wait = None;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.pos))
    }
}

impl ContentReader for SimulatedReader {
    // Content is delivered from memory; the prefetch window has no effect.
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use super::*;
    use crate::torrent::test_data;

    async fn joined(
        engine: &SimulatedEngine,
        descriptor: &[u8],
    ) -> (InfoHash, Arc<SimulatedTorrent>) {
        let mi = MetaInfo::parse(descriptor).unwrap();
        let hash = mi.info_hash();
        engine.add_by_info_hash(hash).await.unwrap();
        let torrent = engine.torrent(hash).unwrap();
        torrent.set_metadata_bytes(mi.info_bytes.clone()).await.unwrap();
        (hash, torrent)
    }

    #[tokio::test]
    async fn test_add_reuses_existing_join() {
        let engine = SimulatedEngine::new();
        let hash = InfoHash::new([7; 20]);

        let (_, first_new) = engine.add_by_info_hash(hash).await.unwrap();
        let (_, second_new) = engine.add_by_info_hash(hash).await.unwrap();

        assert!(first_new);
        assert!(!second_new);
        assert_eq!(engine.join_count(), 1);
    }

    #[tokio::test]
    async fn test_set_metadata_bytes_rejects_wrong_hash() {
        let engine = SimulatedEngine::new();
        let hash = InfoHash::new([9; 20]);
        engine.add_by_info_hash(hash).await.unwrap();
        let torrent = engine.torrent(hash).unwrap();

        let err = torrent
            .set_metadata_bytes(Bytes::from_static(b"d4:name1:a6:lengthi3ee"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidMetadata { .. }));
        assert!(!torrent.has_metadata());
    }

    #[tokio::test]
    async fn test_metadata_unblocks_waiters_and_exposes_layout() {
        let engine = SimulatedEngine::new();
        let descriptor = test_data::multi_file_descriptor("pair", &[("a.txt", 100), ("b.txt", 50)]);
        let (_, torrent) = joined(&engine, &descriptor).await;

        torrent.metadata_ready().await; // completes immediately
        assert_eq!(torrent.total_length(), 150);
        assert_eq!(torrent.name(), "pair");
        assert_eq!(torrent.files()[1].offset, 100);

        let mi = torrent.metainfo().unwrap();
        assert_eq!(mi.info_hash(), torrent.info_hash());
    }

    #[tokio::test]
    async fn test_reader_reads_supplied_content() {
        let engine = SimulatedEngine::new();
        let descriptor = test_data::single_file_descriptor("demo.bin", 8, &[]);
        let (_, torrent) = joined(&engine, &descriptor).await;
        torrent.supply_content(Bytes::from_static(b"abcdefgh"));

        let mut reader = torrent.new_reader();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_reader_seek_then_read() {
        let engine = SimulatedEngine::new();
        let descriptor = test_data::single_file_descriptor("demo.bin", 8, &[]);
        let (_, torrent) = joined(&engine, &descriptor).await;
        torrent.supply_content(Bytes::from_static(b"abcdefgh"));

        let mut reader = torrent.new_reader();
        reader.seek(SeekFrom::Start(6)).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"gh");
    }

    #[tokio::test]
    async fn test_blocked_read_unblocks_when_content_arrives() {
        let engine = SimulatedEngine::new();
        let descriptor = test_data::single_file_descriptor("demo.bin", 4, &[]);
        let (_, torrent) = joined(&engine, &descriptor).await;

        let mut reader = torrent.new_reader();
        let read = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await.unwrap();
            buf
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        torrent.supply_content(Bytes::from_static(b"wxyz"));

        assert_eq!(&read.await.unwrap(), b"wxyz");
    }

    #[tokio::test]
    async fn test_blocked_read_errors_on_close() {
        let engine = SimulatedEngine::new();
        let descriptor = test_data::single_file_descriptor("demo.bin", 4, &[]);
        let (hash, torrent) = joined(&engine, &descriptor).await;

        let mut reader = torrent.new_reader();
        let read = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.drop_torrent(hash).await;

        let err = read.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
