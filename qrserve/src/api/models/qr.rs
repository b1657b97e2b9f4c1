use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /generate`.
///
/// Every styling field is optional and falls back to the configured generation defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "data": "https://example.com",
    "color": "navy",
    "bgColor": "#ffffff",
    "size": 300,
    "errorCorrection": "H"
}))]
pub struct GenerateRequest {
    /// Text to encode. Required and non-empty.
    pub data: Option<String>,
    /// Dark module color: a color name or `#rgb` / `#rrggbb`
    pub color: Option<String>,
    /// Light module color: a color name or `#rgb` / `#rrggbb`
    pub bg_color: Option<String>,
    /// Output edge length in pixels
    #[schema(minimum = 1)]
    pub size: Option<u32>,
    /// One of `L`, `M`, `Q`, `H`. Unrecognized values, including non-strings, use the server default.
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_correction: Option<String>,
}

/// Accepts any JSON value, keeping only strings.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub message: String,
    /// Stored artifact name, `<uuid>.png`
    pub filename: String,
    /// Relative URL the PNG can be fetched from
    pub download_url: String,
}

/// Result of `POST /decode`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecodeResponse {
    pub success: bool,
    pub message: String,
    /// First decoded payload
    pub data: String,
    /// Every decoded payload, in detection order
    pub results: Vec<String>,
}

impl DecodeResponse {
    /// Builds the response from a non-empty payload list.
    pub fn from_payloads(results: Vec<String>) -> Self {
        Self {
            success: true,
            message: "QR code decoded successfully".to_string(),
            data: results.first().cloned().unwrap_or_default(),
            results,
        }
    }
}
