//! Request-facing error taxonomy.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use spate_core::EngineError;
use tracing::error;

/// Errors surfaced to HTTP clients.
///
/// Cache failures never appear here: the cache degrades to a miss. A
/// cancelled request writes nothing at all, so cancellation has no variant
/// either.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid info hash: {reason}")]
    InvalidInfoHash { reason: String },

    #[error("invalid torrent descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable { length: u64 },

    #[error("torrent closed before metadata arrived")]
    TorrentClosed,

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::InvalidInfoHash { .. } | HttpError::InvalidDescriptor { .. } => {
                StatusCode::BAD_REQUEST
            }
            HttpError::FileNotFound { .. } => StatusCode::NOT_FOUND,
            HttpError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            HttpError::TorrentClosed => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Engine(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            error!("request failed: {self}");
        }

        match self {
            HttpError::RangeNotSatisfiable { length } => Response::builder()
                .status(status)
                .header(header::CONTENT_RANGE, format!("bytes */{length}"))
                .body(Body::empty())
                .unwrap_or_else(|_| status.into_response()),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let resp = HttpError::InvalidInfoHash {
            reason: "odd length".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = HttpError::FileNotFound {
            path: "c.txt".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = HttpError::TorrentClosed.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unsatisfiable_range_carries_content_range() {
        let resp = HttpError::RangeNotSatisfiable { length: 100 }.into_response();
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            resp.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */100"
        );
    }
}
