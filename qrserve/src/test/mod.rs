pub mod utils;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::json;
use tempfile::TempDir;

use crate::api::models::{qr::GenerateResponse, uploads::UploadResponse};
use utils::{create_test_app, create_test_config, list_files, plain_png};

fn png_part(bytes: Vec<u8>, file_name: &str) -> Part {
    Part::bytes(bytes).file_name(file_name).mime_type("image/png")
}

fn error_message(response: &axum_test::TestResponse) -> String {
    let body: serde_json::Value = response.json();
    body["error"].as_str().expect("error body").to_string()
}

/// Generate a code, fetch it through the download URL, and read it back through /decode
#[cfg(feature = "decode")]
#[test_log::test(tokio::test)]
async fn test_generate_download_decode_round_trip() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server.post("/generate").json(&json!({ "data": "hello" })).await;
    response.assert_status(StatusCode::CREATED);
    let generated: GenerateResponse = response.json();

    assert_eq!(generated.message, "QR code generated");
    assert!(generated.filename.ends_with(".png"));
    assert_eq!(generated.download_url, format!("/download/{}", generated.filename));
    assert_eq!(list_files(&dir.path().join("qr")), vec![generated.filename.clone()]);

    let download = server.get(&generated.download_url).await;
    download.assert_status_ok();
    assert_eq!(download.headers()["content-type"], "image/png");
    assert_eq!(
        download.headers()["content-disposition"],
        "attachment; filename=\"qr_code.png\""
    );
    let png = download.as_bytes().to_vec();
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!((image.width(), image.height()), (200, 200));

    let decoded = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(png, "qr_code.png")))
        .await;
    decoded.assert_status_ok();
    decoded.assert_json(&json!({
        "success": true,
        "message": "QR code decoded successfully",
        "data": "hello",
        "results": ["hello"]
    }));

    // Decoding never stores anything
    assert!(list_files(&dir.path().join("uploads")).is_empty());
}

#[tokio::test]
async fn test_generate_custom_size_and_colors() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/generate")
        .json(&json!({
            "data": "https://example.com",
            "color": "#800000",
            "bgColor": "yellow",
            "size": 500,
            "errorCorrection": "H"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let generated: GenerateResponse = response.json();

    let download = server.get(&generated.download_url).await;
    let image = image::load_from_memory(download.as_bytes()).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (500, 500));
    assert_eq!(*image.get_pixel(0, 0), image::Rgb([255, 255, 0]));
}

#[tokio::test]
async fn test_generate_requires_data() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    for body in [json!({ "data": "" }), json!({}), json!({ "color": "red" })] {
        let response = server.post("/generate").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "data field is required" }));
    }

    assert!(list_files(&dir.path().join("qr")).is_empty());
}

#[tokio::test]
async fn test_generate_rejects_invalid_options() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/generate")
        .json(&json!({ "data": "x", "color": "white", "bgColor": "#FFF" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "color and bgColor must be different");

    let response = server.post("/generate").json(&json!({ "data": "x", "size": 5000 })).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Unknown error-correction levels fall back to the default instead of failing
    let response = server
        .post("/generate")
        .json(&json!({ "data": "x", "errorCorrection": "ultra" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    for level in [json!(5), json!(true), json!({ "x": 1 }), json!(["H"])] {
        let response = server
            .post("/generate")
            .json(&json!({ "data": "x", "errorCorrection": level }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }
}

#[tokio::test]
async fn test_generate_rejects_data_too_dense_for_size() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server.post("/generate").json(&json!({ "data": "a".repeat(1000) })).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(error_message(&response).starts_with("size too small for data"));
    assert!(list_files(&dir.path().join("qr")).is_empty());

    // The same payload fits once the image is large enough for two pixels per module
    let response = server
        .post("/generate")
        .json(&json!({ "data": "a".repeat(1000), "size": 400 }))
        .await;
    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_generate_malformed_json_is_json_error() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/generate")
        .bytes("{not json".into())
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(!error_message(&response).is_empty());
}

#[tokio::test]
async fn test_download_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let missing = format!("/download/{}.png", uuid::Uuid::new_v4());
    for path in [missing.as_str(), "/download/not-a-uuid.png", "/download/..%2Fconfig.yaml"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert!(error_message(&response).contains("not found"));
    }
}

#[test_log::test(tokio::test)]
async fn test_upload_and_fetch() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;
    let png = plain_png();

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", png_part(png.clone(), "../My Photo.PNG")))
        .await;
    response.assert_status(StatusCode::CREATED);
    let uploaded: UploadResponse = response.json();

    assert_eq!(uploaded.message, "File uploaded successfully");
    assert_eq!(uploaded.original_filename, "My_Photo.PNG");
    assert!(uploaded.filename.ends_with(".png"));
    assert_eq!(uploaded.file_url, format!("/uploads/{}", uploaded.filename));
    assert_eq!(uploaded.file_size, png.len() as u64);
    assert_eq!(list_files(&dir.path().join("uploads")), vec![uploaded.filename.clone()]);

    let fetched = server.get(&uploaded.file_url).await;
    fetched.assert_status_ok();
    assert_eq!(fetched.headers()["content-type"], "image/png");
    assert_eq!(fetched.as_bytes().as_ref(), png.as_slice());

    // Uploads and generated codes are served from separate directories
    let response = server.get(&format!("/download/{}", uploaded.filename)).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_rejections_store_nothing() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_text("note", "no file here"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "No file provided");

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", Part::bytes(plain_png())))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "No file selected");

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", Part::bytes(b"text".to_vec()).file_name("notes.txt")))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "Invalid file type. Allowed types: png, jpg, jpeg");

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", png_part(Vec::new(), "empty.png")))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "File cannot be empty");

    assert!(list_files(&dir.path().join("uploads")).is_empty());
}

#[tokio::test]
async fn test_get_upload_unknown() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server.get(&format!("/uploads/{}.jpg", uuid::Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get(&format!("/uploads/{}.exe", uuid::Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[cfg(feature = "decode")]
#[tokio::test]
async fn test_decode_image_without_code() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(plain_png(), "plain.png")))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "QR code could not be decoded" }));
}

#[cfg(feature = "decode")]
#[test_log::test(tokio::test)]
async fn test_decode_fault_is_server_error() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;
    let png = crate::qr::decode::tests::single_pixel_module_png();

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(png, "tiny_modules.png")))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "Failed to decode image: decoder stopped unexpectedly" }));
}

#[cfg(feature = "decode")]
#[tokio::test]
async fn test_decode_input_validation() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_text("note", "nothing"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "QR image file is required");

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(Vec::new(), "empty.png")))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "File cannot be empty");

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(b"GIF89a garbage".to_vec(), "bad.png")))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&response), "Uploaded file is not a readable image");
}

#[tokio::test]
async fn test_decode_disabled_is_501() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.decode.enabled = false;
    let (server, _bg) = create_test_app(config).await;

    let response = server
        .post("/decode")
        .multipart(MultipartForm::new().add_part("file", png_part(plain_png(), "plain.png")))
        .await;

    response.assert_status(StatusCode::NOT_IMPLEMENTED);
    response.assert_json(&json!({ "error": "QR decoding is not available on this server" }));
}

#[tokio::test]
async fn test_oversized_bodies_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server
        .post("/generate")
        .json(&json!({ "data": "x".repeat(300 * 1024) }))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_message(&response), "Request body is too large");

    let response = server
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", png_part(vec![0u8; 300 * 1024], "big.png")))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

    assert!(list_files(&dir.path().join("qr")).is_empty());
    assert!(list_files(&dir.path().join("uploads")).is_empty());
}

#[tokio::test]
async fn test_client_page_and_health() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("<!DOCTYPE html>"));

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_openapi_json_and_docs() {
    let dir = TempDir::new().unwrap();
    let (server, _bg) = create_test_app(create_test_config(dir.path())).await;

    let response = server.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("\"openapi\""));
    assert!(text.contains("/generate"));

    let response = server.get("/docs").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_cors_allowed_origin() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.cors.allowed_origins = vec![crate::config::CorsOrigin::Url("https://qr.example.com".parse().unwrap())];
    let (server, _bg) = create_test_app(config).await;

    let response = server
        .get("/healthz")
        .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("https://qr.example.com"))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://qr.example.com"
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());

    // Without metrics the path falls through to the asset handler
    let (server, _bg) = create_test_app(config.clone()).await;
    server.get("/internal/metrics").await.assert_status(StatusCode::NOT_FOUND);

    config.enable_metrics = true;
    let (server, _bg) = create_test_app(config).await;
    server.get("/healthz").await.assert_status_ok();

    let response = server.get("/internal/metrics").await;
    response.assert_status_ok();
    let text = response.text();
    assert!(text.contains("# TYPE") || text.contains("# HELP"));
}

#[tokio::test]
async fn test_retention_sweeper_started_when_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());

    let (_server, bg) = create_test_app(config.clone()).await;
    assert_eq!(bg.task_count(), 0);

    config.retention.max_age = Some(std::time::Duration::from_secs(3600));
    let (_server, bg) = create_test_app(config).await;
    assert_eq!(bg.task_count(), 1);
    bg.shutdown().await;
}
