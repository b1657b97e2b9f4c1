use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, imageops};
use qrcode::{QrCode, types::QrError};
use tracing::instrument;

use super::{ErrorCorrection, parse_color};
use crate::config::GenerationConfig;
use crate::errors::{Error, Result};

/// Modules of quiet zone drawn on each side of the symbol.
const QUIET_ZONE_MODULES: u32 = 4;

/// Smallest module edge, in pixels, that still decodes reliably.
const MIN_MODULE_PIXELS: u32 = 2;

/// Fully resolved rendering options for one QR image.
#[derive(Debug, Clone, PartialEq)]
pub struct QrOptions {
    pub foreground: Rgb<u8>,
    pub background: Rgb<u8>,
    /// Edge length of the square output in pixels
    pub size: u32,
    pub error_correction: ErrorCorrection,
}

impl QrOptions {
    /// Applies configured defaults to the optional request fields and validates the result.
    ///
    /// An unrecognized error-correction value falls back to the configured default.
    pub fn resolve(
        foreground: Option<&str>,
        background: Option<&str>,
        size: Option<u32>,
        error_correction: Option<&str>,
        defaults: &GenerationConfig,
    ) -> Result<Self> {
        let foreground_name = foreground.unwrap_or(&defaults.default_foreground);
        let foreground =
            parse_color(foreground_name).ok_or_else(|| Error::bad_request(format!("Unrecognized color '{foreground_name}'")))?;

        let background_name = background.unwrap_or(&defaults.default_background);
        let background =
            parse_color(background_name).ok_or_else(|| Error::bad_request(format!("Unrecognized bgColor '{background_name}'")))?;

        if foreground == background {
            return Err(Error::bad_request("color and bgColor must be different"));
        }

        let size = size.unwrap_or(defaults.default_size);
        if size == 0 || size > defaults.max_size {
            return Err(Error::bad_request(format!(
                "size must be between 1 and {} pixels",
                defaults.max_size
            )));
        }

        let error_correction = match error_correction {
            Some(value) => ErrorCorrection::parse(value).unwrap_or_else(|| {
                tracing::debug!(value, "Unrecognized error correction level, using default");
                defaults.default_error_correction
            }),
            None => defaults.default_error_correction,
        };

        Ok(Self {
            foreground,
            background,
            size,
            error_correction,
        })
    }
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            foreground: Rgb([0, 0, 0]),
            background: Rgb([255, 255, 255]),
            size: 200,
            error_correction: ErrorCorrection::M,
        }
    }
}

/// Encodes `content` as a QR symbol and renders it to a `size × size` PNG.
///
/// Every module is drawn as a whole number of pixels. The symbol and its quiet zone are
/// centred on a canvas filled with the background colour, which absorbs the remainder when
/// `size` is not a multiple of the symbol width. Returns [`Error::BadRequest`] when `size`
/// leaves fewer than two pixels per module.
#[instrument(skip(content), fields(content_len = content.len()))]
pub fn render_png(content: &str, options: &QrOptions) -> Result<Vec<u8>> {
    if content.is_empty() {
        return Err(Error::bad_request("data field is required"));
    }

    let code = QrCode::with_error_correction_level(content.as_bytes(), options.error_correction.into()).map_err(|e| match e {
        QrError::DataTooLong => Error::bad_request(format!(
            "data is too long to encode as a QR code at error correction level {}",
            options.error_correction
        )),
        other => Error::Internal {
            operation: format!("encode QR code: {other}"),
        },
    })?;

    let span = code.width() as u32 + 2 * QUIET_ZONE_MODULES;
    let module = options.size / span;
    if module < MIN_MODULE_PIXELS {
        return Err(Error::bad_request(format!(
            "size too small for data, at least {} pixels are needed",
            span * MIN_MODULE_PIXELS
        )));
    }

    let symbol = code
        .render::<Rgb<u8>>()
        .dark_color(options.foreground)
        .light_color(options.background)
        .quiet_zone(true)
        .module_dimensions(module, module)
        .build();

    let mut image = RgbImage::from_pixel(options.size, options.size, options.background);
    let offset = i64::from((options.size - symbol.width()) / 2);
    imageops::overlay(&mut image, &symbol, offset, offset);
    tracing::trace!(module, symbol_width = symbol.width(), "Rendered QR symbol");

    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Internal {
            operation: format!("encode PNG: {e}"),
        })?;

    Ok(png)
}
