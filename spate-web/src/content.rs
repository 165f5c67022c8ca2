//! Content serving: torrent bytes as range-capable HTTP responses.
//!
//! Serving blocks on metadata readiness, then streams the requested byte
//! window through a bounded, closure-interruptible reader. Piece arrival is
//! asynchronous and out-of-order at the swarm level; the engine's reader
//! hides that, and the configured read-ahead keeps the stream smooth.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use futures::stream;
use spate_core::ContentReader;
use spate_core::engine::reader::{InterruptibleReader, SectionReader};
use tokio::io::AsyncReadExt;

use crate::error::HttpError;
use crate::range::{parse_range_header, resolve_range};
use crate::resolver::ResolvedTorrent;
use crate::server::AppState;

/// Chunk size for streamed response bodies.
const CHUNK_SIZE: usize = 256 * 1024; // 256 KiB

type ServeReader = InterruptibleReader<SectionReader<Box<dyn ContentReader>>>;

/// Serves a resolved torrent (or one file within it) as an HTTP response.
///
/// With a sub-path, the file with that exact display path is served and the
/// response carries an ETag derived from the info hash and path, stable
/// across processes. No Last-Modified is emitted; torrent content has no
/// meaningful timestamp. Without a sub-path, the whole torrent content is
/// served under the torrent's name.
///
/// # Errors
/// - `HttpError::TorrentClosed` - Torrent dropped while awaiting metadata
/// - `HttpError::FileNotFound` - Sub-path matches no file
/// - `HttpError::RangeNotSatisfiable` - Range starts past the content end
pub async fn serve(
    state: &AppState,
    resolved: ResolvedTorrent,
    path: Option<String>,
    headers: &HeaderMap,
) -> Result<Response, HttpError> {
    let handle = resolved.handle().clone();

    // Client disconnect drops this future; closure must unblock it too.
    tokio::select! {
        _ = handle.metadata_ready() => {}
        _ = handle.closed() => return Err(HttpError::TorrentClosed),
    }

    let (offset, length, name, etag) = match path {
        Some(path) => {
            let file = handle
                .files()
                .into_iter()
                .find(|file| file.path == path)
                .ok_or_else(|| HttpError::FileNotFound { path: path.clone() })?;
            let etag = format!("\"{}/{}\"", handle.info_hash(), path);
            (file.offset, file.length, path, Some(etag))
        }
        None => (0, handle.total_length(), handle.name(), None),
    };

    if let Some(etag) = &etag
        && headers
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
            == Some(etag.as_str())
    {
        return Ok(not_modified(etag));
    }

    let (status, start, body_len, content_range) = match parse_range_header(headers) {
        Some(range) => {
            let (start, end) =
                resolve_range(range, length).ok_or(HttpError::RangeNotSatisfiable { length })?;
            (
                StatusCode::PARTIAL_CONTENT,
                start,
                end - start + 1,
                Some(format!("bytes {start}-{end}/{length}")),
            )
        }
        None => (StatusCode::OK, 0, length, None),
    };

    let mut reader = handle.new_reader();
    reader.set_read_ahead(state.config.serve.read_ahead);
    let section = SectionReader::new(reader, offset + start, body_len);
    let closed = {
        let handle = handle.clone();
        Box::pin(async move { handle.closed().await })
    };
    let reader = InterruptibleReader::new(section, closed);

    let mut builder = Response::builder()
        .status(status)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_TYPE,
            mime_guess::from_path(&name).first_or_octet_stream().to_string(),
        )
        .header(header::CONTENT_LENGTH, body_len);
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    if let Some(etag) = etag
        && let Ok(value) = HeaderValue::try_from(etag)
    {
        builder = builder.header(header::ETAG, value);
    }

    Ok(builder
        .body(Body::from_stream(body_stream(reader, resolved)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

fn not_modified(etag: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    if let Ok(value) = HeaderValue::try_from(etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

/// Streams the bounded reader in chunks.
///
/// The resolution (and with it this request's torrent reference) rides the
/// stream state, so the grace-deferred release is only scheduled once the
/// body completes or the client goes away; the reader itself is returned to
/// the engine at the same moment, by drop.
fn body_stream(
    reader: ServeReader,
    resolved: ResolvedTorrent,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    stream::unfold(Some((reader, resolved)), |state| async move {
        let (mut reader, resolved) = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some((reader, resolved))))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}
