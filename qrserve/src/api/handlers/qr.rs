//! QR generation, artifact download and decoding.

use axum::{
    Json,
    extract::{Path, State, multipart::Multipart, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
};
use tracing::instrument;

use super::{file_response, json_rejection, read_file_part};
use crate::{
    AppState,
    api::models::qr::{DecodeResponse, GenerateRequest, GenerateResponse},
    errors::{Error, ErrorResponse, Result},
    qr::{self, QrOptions},
    storage::{Area, StoredName},
};

const ARTIFACT_EXTENSION: &str = "png";

/// Generate a QR code
#[utoipa::path(
    post,
    path = "/generate",
    tag = "qr",
    summary = "Generate QR code",
    description = "Encodes `data` as a QR code and stores it as a PNG. The image is not returned inline: fetch it from `download_url`.",
    request_body = GenerateRequest,
    responses(
        (status = 201, description = "QR code generated", body = GenerateResponse),
        (status = 400, description = "Missing data or invalid styling options", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn generate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GenerateResponse>)> {
    let Json(request) = payload.map_err(json_rejection)?;

    let data = match request.data {
        Some(data) if !data.is_empty() => data,
        _ => return Err(Error::bad_request("data field is required")),
    };

    let options = QrOptions::resolve(
        request.color.as_deref(),
        request.bg_color.as_deref(),
        request.size,
        request.error_correction.as_deref(),
        &state.config.generation,
    )?;

    let png = tokio::task::spawn_blocking(move || qr::render_png(&data, &options))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("render QR code: {e}"),
        })??;

    let stored = state.storage.save(Area::Generated, ARTIFACT_EXTENSION, &png).await?;
    let filename = stored.name.to_string();

    tracing::info!(filename = %filename, bytes = stored.size_bytes, "Generated QR code");

    Ok((
        StatusCode::CREATED,
        Json(GenerateResponse {
            message: "QR code generated".to_string(),
            download_url: format!("/download/{filename}"),
            filename,
        }),
    ))
}

/// Download a generated QR code
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "qr",
    summary = "Download QR code",
    description = "Returns a previously generated QR code as a PNG attachment.",
    params(
        ("filename" = String, Path, description = "Artifact name returned by /generate, `<uuid>.png`")
    ),
    responses(
        (status = 200, description = "PNG image", content_type = "image/png"),
        (status = 404, description = "QR code not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(filename = %filename))]
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Response> {
    let name = StoredName::parse(&filename, &[ARTIFACT_EXTENSION.to_string()]).ok_or_else(|| Error::NotFound {
        resource: "QR code".to_string(),
        id: filename.clone(),
    })?;

    let (file, len) = state.storage.open(Area::Generated, &name).await?;
    file_response(file, len, "image/png", Some("attachment; filename=\"qr_code.png\""))
}

/// Decode QR codes from an image
#[utoipa::path(
    post,
    path = "/decode",
    tag = "qr",
    summary = "Decode QR code",
    description = "Reads every QR code in the uploaded image. The image is processed in memory and not stored.",
    request_body(
        content_type = "multipart/form-data",
        description = "Image in a `file` field"
    ),
    responses(
        (status = 200, description = "At least one QR code was decoded", body = DecodeResponse),
        (status = 400, description = "Missing or unreadable image, or no QR code found", body = ErrorResponse),
        (status = 413, description = "Payload too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 501, description = "Decoding is not available on this server", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn decode(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<DecodeResponse>> {
    if !state.config.decode.is_available() {
        return Err(qr::decode::unavailable());
    }

    let part = read_file_part(multipart)
        .await?
        .ok_or_else(|| Error::bad_request("QR image file is required"))?;
    if part.file_name.as_deref().is_none_or(str::is_empty) {
        return Err(Error::bad_request("No file selected"));
    }
    if part.bytes.is_empty() {
        return Err(Error::bad_request("File cannot be empty"));
    }

    let payloads = qr::decode_blocking(part.bytes).await?;
    tracing::info!(count = payloads.len(), "Decoded QR codes");

    Ok(Json(DecodeResponse::from_payloads(payloads)))
}
