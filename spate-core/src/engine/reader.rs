//! Reader adapters used when serving torrent content.
//!
//! [`SectionReader`] bounds a seekable reader to a byte window, and
//! [`InterruptibleReader`] races every read against a closure signal so a
//! read blocked on missing swarm data cannot stall past cancellation.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// A view over `[start, start + length)` of an underlying seekable reader.
///
/// Seeks within the section are relative to its start; reads never cross the
/// section's end. The underlying cursor is positioned lazily, on the first
/// read after construction or a seek.
pub struct SectionReader<R> {
    inner: R,
    start: u64,
    length: u64,
    pos: u64,
    inner_synced: bool,
    seek_in_flight: bool,
}

impl<R: AsyncRead + AsyncSeek + Send + Unpin> SectionReader<R> {
    pub fn new(inner: R, start: u64, length: u64) -> Self {
        Self {
            inner,
            start,
            length,
            pos: 0,
            inner_synced: false,
            seek_in_flight: false,
        }
    }

    /// Current position relative to the section start.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn poll_sync_inner(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if !self.seek_in_flight {
            let target = self.start + self.pos;
            Pin::new(&mut self.inner).start_seek(SeekFrom::Start(target))?;
            self.seek_in_flight = true;
        }
        ready!(Pin::new(&mut self.inner).poll_complete(cx))?;
        self.seek_in_flight = false;
        self.inner_synced = true;
        Poll::Ready(Ok(()))
    }
}

impl<R: AsyncRead + AsyncSeek + Send + Unpin> AsyncRead for SectionReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.inner_synced {
            ready!(this.poll_sync_inner(cx))?;
        }

        let remaining = this.length.saturating_sub(this.pos);
        if remaining == 0 {
            return Poll::Ready(Ok(()));
        }

        if buf.remaining() as u64 <= remaining {
            let before = buf.filled().len();
            ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
            this.pos += (buf.filled().len() - before) as u64;
            return Poll::Ready(Ok(()));
        }

        // Near the section end the caller's buffer is larger than what is
        // left; read through a bounded scratch buffer.
        let mut scratch = vec![0u8; remaining as usize];
        let mut bounded = ReadBuf::new(&mut scratch);
        ready!(Pin::new(&mut this.inner).poll_read(cx, &mut bounded))?;
        buf.put_slice(bounded.filled());
        this.pos += bounded.filled().len() as u64;
        Poll::Ready(Ok(()))
    }
}

impl<R: AsyncRead + AsyncSeek + Send + Unpin> AsyncSeek for SectionReader<R> {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let target = match position {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(offset) => i128::from(this.length) + i128::from(offset),
            SeekFrom::Current(offset) => i128::from(this.pos) + i128::from(offset),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before section start",
            ));
        }
        this.pos = u64::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek overflow"))?;
        this.inner_synced = false;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.pos))
    }
}

type ClosedFuture = BoxFuture<'static, ()>;

/// Wraps a reader so every read races a closure signal.
///
/// Engine reads block indefinitely while the swarm is missing data; when the
/// signal fires the pending read resolves to an `Interrupted` error instead,
/// letting the response terminate promptly.
pub struct InterruptibleReader<R> {
    inner: R,
    closed: ClosedFuture,
    interrupted: bool,
}

impl<R: AsyncRead + Send + Unpin> InterruptibleReader<R> {
    pub fn new(inner: R, closed: ClosedFuture) -> Self {
        Self {
            inner,
            closed,
            interrupted: false,
        }
    }
}

impl<R: AsyncRead + Send + Unpin> AsyncRead for InterruptibleReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.interrupted && this.closed.as_mut().poll(cx).is_ready() {
            this.interrupted = true;
        }
        if this.interrupted {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "torrent closed",
            )));
        }

        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use super::*;

    #[tokio::test]
    async fn test_section_reader_bounds_window() {
        let data: Vec<u8> = (0u8..100).collect();
        let mut section = SectionReader::new(Cursor::new(data), 10, 20);

        let mut out = Vec::new();
        section.read_to_end(&mut out).await.unwrap();

        let expected: Vec<u8> = (10u8..30).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn test_section_reader_seek_is_relative() {
        let data: Vec<u8> = (0u8..100).collect();
        let mut section = SectionReader::new(Cursor::new(data), 40, 30);

        section.seek(SeekFrom::Start(5)).await.unwrap();
        let mut buf = [0u8; 4];
        section.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [45, 46, 47, 48]);

        let pos = section.seek(SeekFrom::End(-2)).await.unwrap();
        assert_eq!(pos, 28);
        let mut tail = Vec::new();
        section.read_to_end(&mut tail).await.unwrap();
        assert_eq!(tail, vec![68, 69]);
    }

    #[tokio::test]
    async fn test_section_reader_rejects_negative_seek() {
        let mut section = SectionReader::new(Cursor::new(vec![0u8; 10]), 0, 10);
        assert!(section.seek(SeekFrom::Current(-1)).await.is_err());
    }

    #[tokio::test]
    async fn test_interruptible_reader_passes_data_through() {
        let reader = Cursor::new(vec![1u8, 2, 3]);
        let mut wrapped =
            InterruptibleReader::new(reader, Box::pin(std::future::pending::<()>()));

        let mut out = Vec::new();
        wrapped.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_interruptible_reader_errors_once_closed() {
        // A pending inner read would block forever; the closure signal must
        // take priority.
        let mut wrapped = InterruptibleReader::new(
            tokio::io::empty().chain(PendingReader),
            Box::pin(async { tokio::time::sleep(Duration::from_millis(10)).await }),
        );

        let mut buf = [0u8; 4];
        // Drain the empty half first so the next read parks on PendingReader.
        let err = tokio::time::timeout(Duration::from_secs(1), wrapped.read_exact(&mut buf))
            .await
            .expect("read should unblock on closure")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    struct PendingReader;

    impl AsyncRead for PendingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }
}
