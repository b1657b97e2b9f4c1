use bytes::Bytes;
use tracing::instrument;

use crate::errors::{Error, Result};

/// Name reported to clients when decoding is unavailable.
pub const DECODE_CAPABILITY: &str = "QR decoding";

/// Error returned when the decoder is disabled or compiled out
pub fn unavailable() -> Error {
    Error::CapabilityUnavailable {
        capability: DECODE_CAPABILITY.to_string(),
    }
}

/// Reads every QR symbol found in an encoded raster image.
///
/// Payloads are returned in detection order. Detected grids that fail to decode are skipped,
/// so an image whose only candidates are false positives reports [`Error::NoCodeFound`] just
/// like an image with no candidates at all.
#[cfg(feature = "decode")]
#[instrument(skip(bytes), fields(bytes = bytes.len()))]
pub fn decode_payloads(bytes: &[u8]) -> Result<Vec<String>> {
    let image = image::load_from_memory(bytes).map_err(|e| {
        tracing::debug!(error = %e, "Upload is not a readable image");
        Error::bad_request("Uploaded file is not a readable image")
    })?;

    let luma = image.to_luma8();
    let (width, height) = luma.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
        luma.get_pixel(x as u32, y as u32).0[0]
    });

    let grids = prepared.detect_grids();
    tracing::debug!(candidates = grids.len(), width, height, "Detected QR grid candidates");

    let mut payloads = Vec::with_capacity(grids.len());
    for (index, grid) in grids.iter().enumerate() {
        match grid.decode() {
            Ok((_meta, content)) => payloads.push(content),
            Err(e) => tracing::debug!(index, error = ?e, "Skipping undecodable grid"),
        }
    }

    if payloads.is_empty() {
        return Err(Error::NoCodeFound);
    }

    Ok(payloads)
}

#[cfg(not(feature = "decode"))]
pub fn decode_payloads(_bytes: &[u8]) -> Result<Vec<String>> {
    Err(unavailable())
}

/// Runs [`decode_payloads`] on the blocking pool.
///
/// A panic inside the decoder surfaces as [`Error::Decode`] instead of tearing down the request.
pub async fn decode_blocking(bytes: Bytes) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || decode_payloads(&bytes))
        .await
        .map_err(|e| Error::Decode {
            message: if e.is_panic() {
                "decoder stopped unexpectedly".to_string()
            } else {
                e.to_string()
            },
        })?
}
