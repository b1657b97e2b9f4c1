use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Descriptor returned by `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Stored name, `<uuid>.<ext>`
    pub filename: String,
    /// Client-supplied name after sanitizing; informational only
    pub original_filename: String,
    /// Relative URL the stored file can be fetched from
    pub file_url: String,
    /// Size in bytes
    pub file_size: u64,
}
