//! OpenAPI document for the HTTP API.

use utoipa::OpenApi;

use crate::api;
use crate::errors::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "qrserve",
        description = "Generate QR codes from text, decode QR codes from images, and store uploaded images."
    ),
    paths(
        api::handlers::qr::generate,
        api::handlers::qr::download,
        api::handlers::qr::decode,
        api::handlers::uploads::upload,
        api::handlers::uploads::get_upload,
    ),
    components(schemas(
        api::models::qr::GenerateRequest,
        api::models::qr::GenerateResponse,
        api::models::qr::DecodeResponse,
        api::models::uploads::UploadResponse,
        ErrorResponse,
    )),
    tags(
        (name = "qr", description = "QR code generation and decoding"),
        (name = "uploads", description = "Image uploads"),
    )
)]
pub struct ApiDoc;
