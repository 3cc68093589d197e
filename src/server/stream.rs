//! Local file responses with byte-range support
//!
//! One request moves through
//! `Received -> {PathMissing 404 | RangeInvalid 416 | RangeValid 206 | NoRange 200 | IOFailure 500}`.
//! The body is a lazy chunk stream opened at the first requested byte, so
//! memory per request stays at one chunk whatever the range size.

use std::future::Future;
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use super::range::{RangeRequest, unsatisfied_range};
use crate::utils::mime_for_path;

/// Upper bound on the bytes held in memory per active stream
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Finite, non-restartable sequence of file chunks covering one span
///
/// Dropping it closes the file.
pub type FileChunks = ReaderStream<Take<File>>;

/// Status, headers and optional body for one local file request
pub struct FileStreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Present only for 200 and 206
    pub body: Option<FileChunks>,
}

impl std::fmt::Debug for FileStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

impl FileStreamResponse {
    fn bodiless(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn not_found() -> Self {
        Self::bodiless(StatusCode::NOT_FOUND)
    }

    fn internal_error() -> Self {
        Self::bodiless(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn range_not_satisfiable(file_size: u64) -> Self {
        let mut response = Self::bodiless(StatusCode::RANGE_NOT_SATISFIABLE);
        if let Ok(value) = HeaderValue::from_str(&unsatisfied_range(file_size)) {
            response.headers.insert(header::CONTENT_RANGE, value);
        }
        response
    }

    /// Value of a header as text, if present
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl IntoResponse for FileStreamResponse {
    fn into_response(self) -> Response {
        let body = match self.body {
            Some(chunks) => Body::from_stream(chunks),
            None => Body::empty(),
        };
        (self.status, self.headers, body).into_response()
    }
}

/// Turn a virtual-address path into an absolute filesystem path
///
/// Strips a `file://` prefix and resolves `.` and `..` lexically, without
/// following symlinks. `..` never climbs above the root. Relative paths are
/// rejected.
pub fn normalize_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("file://").unwrap_or(trimmed);

    // file:///C:/music/a.flac
    #[cfg(windows)]
    let trimmed = match trimmed.strip_prefix('/') {
        Some(rest) if rest.get(1..2) == Some(":") => rest,
        _ => trimmed,
    };

    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return None;
    }

    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Some(resolved)
}

async fn open_span(path: &Path, start: u64, len: u64) -> io::Result<FileChunks> {
    let mut file = File::open(path).await?;
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }
    Ok(ReaderStream::with_capacity(file.take(len), CHUNK_SIZE))
}

/// Serve `path`, or the span selected by the `Range` header value `range`
pub async fn stream_local_file(path: &Path, range: Option<&str>) -> FileStreamResponse {
    respond_with(path, range, |path, start, len| async move {
        open_span(&path, start, len).await
    })
    .await
}

/// `stream_local_file` with the span opener supplied by the caller
async fn respond_with<F, Fut>(path: &Path, range: Option<&str>, open: F) -> FileStreamResponse
where
    F: FnOnce(PathBuf, u64, u64) -> Fut,
    Fut: Future<Output = io::Result<FileChunks>>,
{
    if !path.is_absolute() {
        debug!("Rejecting relative path {:?}", path);
        return FileStreamResponse::not_found();
    }

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => {
            debug!("Not a regular file: {:?}", path);
            return FileStreamResponse::not_found();
        }
        // A regular file used as a parent directory also means missing
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            debug!("File not found: {:?}", path);
            return FileStreamResponse::not_found();
        }
        Err(e) => {
            error!("Failed to stat {:?}: {}", path, e);
            return FileStreamResponse::internal_error();
        }
    };
    let file_size = metadata.len();

    let range = match range.map(|spec| RangeRequest::parse(spec, file_size)) {
        None => None,
        Some(Ok(r)) => Some(r),
        Some(Err(e)) => {
            debug!(
                "Rejecting range {:?} for {:?} ({} bytes): {}",
                range, path, file_size, e
            );
            return FileStreamResponse::range_not_satisfiable(file_size);
        }
    };

    let (start, len) = match range {
        Some(r) => (r.start, r.content_length()),
        None => (0, file_size),
    };

    let chunks = match open(path.to_path_buf(), start, len).await {
        Ok(chunks) => chunks,
        Err(e) => {
            error!("Failed to open {:?} at {}: {}", path, start, e);
            return FileStreamResponse::internal_error();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_for_path(path)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let status = match range {
        Some(r) => {
            if let Ok(value) = HeaderValue::from_str(&r.content_range(file_size)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
            StatusCode::PARTIAL_CONTENT
        }
        None => StatusCode::OK,
    };

    debug!(
        "Serving {:?} bytes {}..{} of {} ({})",
        path,
        start,
        start + len,
        file_size,
        status
    );

    FileStreamResponse {
        status,
        headers,
        body: Some(chunks),
    }
}
