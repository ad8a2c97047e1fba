use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::range::{parse_range, ByteRange, RangeError};

/// Every stream is served as mpeg audio, matching what the scanner imports.
pub const AUDIO_MIME: &str = "audio/mpeg";

/// Serves an audio file with single-range support: 200 for full requests,
/// 206 for a satisfiable range, 416 when the range lies outside the file.
/// A malformed `Range` header is ignored per RFC 7233.
pub async fn stream_file(
    path: &Path,
    range_header: Option<&str>,
) -> Result<Response, std::io::Error> {
    let file = File::open(path).await?;
    let size = file.metadata().await?.len();

    let range = match range_header {
        Some(value) => match parse_range(value, size) {
            Ok(range) => Some(range),
            Err(RangeError::Malformed) => None,
            Err(RangeError::Unsatisfiable) => return Ok(range_not_satisfiable(size)),
        },
        None => None,
    };

    match range {
        Some(range) => partial_response(file, range, size).await,
        None => Ok(full_response(file, size)),
    }
}

fn full_response(file: File, size: u64) -> Response {
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    insert_static_headers(headers);
    insert_header(headers, header::CONTENT_LENGTH, size.to_string());
    response
}

async fn partial_response(
    mut file: File,
    range: ByteRange,
    size: u64,
) -> Result<Response, std::io::Error> {
    file.seek(SeekFrom::Start(range.start)).await?;
    let reader = file.take(range.len());

    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    let headers = response.headers_mut();
    insert_static_headers(headers);
    insert_header(headers, header::CONTENT_LENGTH, range.len().to_string());
    insert_header(
        headers,
        header::CONTENT_RANGE,
        format!("bytes {}-{}/{}", range.start, range.end, size),
    );
    Ok(response)
}

fn range_not_satisfiable(size: u64) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_header(headers, header::CONTENT_RANGE, format!("bytes */{}", size));
    response
}

fn insert_static_headers(headers: &mut HeaderMap) {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(AUDIO_MIME));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}

fn insert_header(headers: &mut HeaderMap, name: header::HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::stream_file;
    use axum::http::{header, StatusCode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn audio_fixture() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 1000]).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn full_request_gets_200_with_accept_ranges() {
        let file = audio_fixture();
        let response = stream_file(file.path(), None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCEPT_RANGES).unwrap(),
            "bytes"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "audio/mpeg"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "1000"
        );
    }

    #[tokio::test]
    async fn range_request_gets_206_with_content_range() {
        let file = audio_fixture();
        let response = stream_file(file.path(), Some("bytes=200-499")).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 200-499/1000"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "300"
        );
    }

    #[tokio::test]
    async fn malformed_range_is_ignored() {
        let file = audio_fixture();
        let response = stream_file(file.path(), Some("bytes=oops")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn out_of_bounds_range_gets_416() {
        let file = audio_fixture();
        let response = stream_file(file.path(), Some("bytes=5000-")).await.unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1000"
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let result = stream_file(std::path::Path::new("/nonexistent/file.mp3"), None).await;
        assert!(result.is_err());
    }
}
