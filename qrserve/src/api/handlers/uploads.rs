use axum::{
    Json,
    extract::{Path, State, multipart::Multipart, multipart::MultipartRejection},
    http::StatusCode,
    response::Response,
};
use tracing::instrument;

use super::{file_response, read_file_part};
use crate::{
    AppState,
    api::models::uploads::UploadResponse,
    errors::{Error, ErrorResponse, Result},
    storage::{Area, StoredName, allowed_extension, sanitize_filename},
};

/// Upload an image
#[utoipa::path(
    post,
    path = "/upload",
    tag = "uploads",
    summary = "Upload image",
    description = "Stores an image under a freshly generated name. Only the configured extensions are accepted (png, jpg and jpeg by default).",
    request_body(
        content_type = "multipart/form-data",
        description = "Image in a `file` field"
    ),
    responses(
        (status = 201, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Missing, empty or disallowed file", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let part = read_file_part(multipart)
        .await?
        .ok_or_else(|| Error::bad_request("No file provided"))?;

    let original = part.file_name.unwrap_or_default();
    if original.is_empty() {
        return Err(Error::bad_request("No file selected"));
    }

    let allowed = &state.config.uploads.allowed_extensions;
    let extension = allowed_extension(&original, allowed)
        .ok_or_else(|| Error::bad_request(format!("Invalid file type. Allowed types: {}", allowed.join(", "))))?;

    if part.bytes.is_empty() {
        return Err(Error::bad_request("File cannot be empty"));
    }

    let stored = state.storage.save(Area::Uploads, &extension, &part.bytes).await?;
    let filename = stored.name.to_string();
    let original_filename = sanitize_filename(&original);

    tracing::info!(
        filename = %filename,
        original_filename = %original_filename,
        bytes = stored.size_bytes,
        "Stored upload"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file_url: format!("/uploads/{filename}"),
            filename,
            original_filename,
            file_size: stored.size_bytes,
        }),
    ))
}

/// Fetch an uploaded image
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    tag = "uploads",
    summary = "Get uploaded image",
    params(
        ("filename" = String, Path, description = "Stored name returned by /upload")
    ),
    responses(
        (status = 200, description = "The stored file"),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(filename = %filename))]
pub async fn get_upload(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response> {
    let name = StoredName::parse(&filename, &state.config.uploads.allowed_extensions).ok_or_else(|| Error::NotFound {
        resource: "File".to_string(),
        id: filename.clone(),
    })?;

    let (file, len) = state.storage.open(Area::Uploads, &name).await?;
    let mime = mime_guess::from_ext(&name.extension).first_or_octet_stream();
    file_response(file, len, mime.as_ref(), None)
}
