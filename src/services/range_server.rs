use std::io::SeekFrom;
use std::path::Path;

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive.
    pub end: u64,
}

impl ByteRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("Requested range not satisfiable for {size} bytes")]
    Unsatisfiable { size: u64 },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RangeError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Parses a `bytes=<start>-<end>` header against a file of `size` bytes.
///
/// An open end (`bytes=<start>-`) is capped at `chunk_size` bytes. Suffix
/// ranges, multiple ranges and other units are not supported and are treated
/// like any other unsatisfiable range.
pub fn parse_range(value: &str, size: u64, chunk_size: u64) -> Result<ByteRange, RangeError> {
    let unsatisfiable = RangeError::Unsatisfiable { size };

    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return Err(unsatisfiable);
    };
    if spec.contains(',') {
        return Err(unsatisfiable);
    }
    let Some((start, end)) = spec.trim().split_once('-') else {
        return Err(unsatisfiable);
    };

    let Ok(start) = start.trim().parse::<u64>() else {
        return Err(unsatisfiable);
    };
    if start >= size {
        return Err(unsatisfiable);
    }

    let end = match end.trim() {
        "" => start
            .saturating_add(chunk_size.max(1) - 1)
            .min(size - 1),
        end => match end.parse::<u64>() {
            Ok(end) => end,
            Err(_) => return Err(unsatisfiable),
        },
    };

    if start > end || end >= size {
        return Err(unsatisfiable);
    }

    Ok(ByteRange { start, end })
}

/// Streams `path`, or the requested slice of it.
///
/// Without a range header the whole file is sent with 200. Dropping the
/// response body (client went away) closes the file.
pub async fn serve(
    path: &Path,
    range: Option<&HeaderValue>,
    content_type: &'static str,
    chunk_size: u64,
) -> Result<Response, RangeError> {
    let mut file = File::open(path).await.map_err(|e| RangeError::io(path, e))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| RangeError::io(path, e))?
        .len();

    let Some(range) = range else {
        tracing::debug!("Streaming whole file: {} | Size: {}", path.display(), size);
        let body = Body::from_stream(ReaderStream::new(file));
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_LENGTH, size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response());
    };

    let value = range
        .to_str()
        .map_err(|_| RangeError::Unsatisfiable { size })?;
    let range = parse_range(value, size, chunk_size)?;

    file.seek(SeekFrom::Start(range.start))
        .await
        .map_err(|e| RangeError::io(path, e))?;
    let body = Body::from_stream(ReaderStream::new(file.take(range.length())));

    tracing::debug!(
        "Streaming: {} | Size: {} | Range: {}-{}",
        path.display(),
        size,
        range.start,
        range.end
    );

    Ok((
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, range.length().to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, size),
            ),
        ],
        body,
    )
        .into_response())
}
