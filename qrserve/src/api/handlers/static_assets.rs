//! HTTP handlers for the embedded client.

use axum::{
    body::Body,
    http::{Response, Uri, header},
};
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::static_assets::Assets;

fn asset_response(path: &str) -> Option<Result<Response<Body>>> {
    let content = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Some(
        Response::builder()
            .header(header::CONTENT_TYPE, mime.as_ref())
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(content.data.into_owned()))
            .map_err(|e| Error::Internal {
                operation: format!("build asset response: {e}"),
            }),
    )
}

/// Client page at `/`. Doubles as the liveness check.
#[instrument]
pub async fn serve_index() -> Result<Response<Body>> {
    asset_response("index.html").unwrap_or_else(|| {
        Err(Error::Internal {
            operation: "load embedded index.html".to_string(),
        })
    })
}

/// Serve any other embedded file, or a JSON 404.
#[instrument]
pub async fn serve_embedded_asset(uri: Uri) -> Result<Response<Body>> {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    asset_response(path).unwrap_or_else(|| {
        Err(Error::NotFound {
            resource: "Path".to_string(),
            id: uri.path().to_string(),
        })
    })
}
