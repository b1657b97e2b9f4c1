//! HTTP API: route handlers and their request/response models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: JSON bodies exchanged with clients
//!
//! # Endpoints
//!
//! - `POST /generate`, `GET /download/{filename}`: QR generation and artifact retrieval
//! - `POST /decode`: QR decoding of an uploaded image (nothing is stored)
//! - `POST /upload`, `GET /uploads/{filename}`: plain image uploads
//! - `GET /healthz`: liveness
//!
//! Every error is returned as `{"error": "..."}`. The OpenAPI document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
