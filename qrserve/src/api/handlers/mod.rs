//! HTTP request handlers.
//!
//! - [`qr`]: generation, artifact download and decoding
//! - [`uploads`]: storing and serving uploaded images
//! - [`static_assets`]: the embedded browser client
//!
//! Extractor rejections are converted here so that every failure, including malformed JSON and
//! oversized bodies, reaches the client as the usual JSON error body.

pub mod qr;
pub mod static_assets;
pub mod uploads;

use axum::{
    body::Body,
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::errors::{Error, Result};

/// The `file` part of a multipart form.
#[derive(Debug)]
pub struct FilePart {
    /// Client-supplied file name, if any
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Reads the first multipart field named `file`. Other fields are skipped.
pub(crate) async fn read_file_part(multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Option<FilePart>> {
    let mut multipart = multipart.map_err(|e| Error::bad_request(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(FilePart { file_name, bytes }));
    }

    Ok(None)
}

fn payload_too_large() -> Error {
    Error::PayloadTooLarge {
        message: "Request body is too large".to_string(),
    }
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large()
    } else {
        Error::bad_request(format!("Failed to parse multipart data: {}", e.body_text()))
    }
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> Error {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large()
    } else {
        Error::bad_request(rejection.body_text())
    }
}

/// Streams an open file as the response body.
pub(crate) fn file_response(file: File, len: u64, content_type: &str, disposition: Option<&str>) -> Result<Response> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len);
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, HeaderValue::from_str(disposition).map_err(|e| Error::Internal {
            operation: format!("build Content-Disposition header: {e}"),
        })?);
    }

    builder.body(Body::from_stream(ReaderStream::new(file))).map_err(|e| Error::Internal {
        operation: format!("build file response: {e}"),
    })
}
