//! QR generation and decoding.
//!
//! Symbol encoding is done by the [`qrcode`] crate and detection by [`rqrr`] (behind the
//! `decode` feature). This module only translates between HTTP-level options and those
//! libraries, and moves the CPU-bound work off the async runtime.
//!
//! - [`generate`]: text + styling options → PNG bytes
//! - [`decode`]: raster image bytes → decoded payloads in detection order

pub mod decode;
pub mod generate;

use image::Rgb;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub use decode::{decode_blocking, decode_payloads};
pub use generate::{QrOptions, render_png};

/// QR redundancy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum ErrorCorrection {
    /// ~7% of codewords can be restored
    L,
    /// ~15% of codewords can be restored
    #[default]
    M,
    /// ~25% of codewords can be restored
    Q,
    /// ~30% of codewords can be restored
    H,
}

impl ErrorCorrection {
    /// Parses a level name case-insensitively. Anything unrecognized yields `None` so callers can
    /// fall back to their default instead of failing the request.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Some(Self::L),
            "M" | "MEDIUM" => Some(Self::M),
            "Q" | "QUARTILE" => Some(Self::Q),
            "H" | "HIGH" => Some(Self::H),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

impl From<ErrorCorrection> for qrcode::EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => qrcode::EcLevel::L,
            ErrorCorrection::M => qrcode::EcLevel::M,
            ErrorCorrection::Q => qrcode::EcLevel::Q,
            ErrorCorrection::H => qrcode::EcLevel::H,
        }
    }
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("navy", [0, 0, 128]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("maroon", [128, 0, 0]),
    ("teal", [0, 128, 128]),
    ("olive", [128, 128, 0]),
];

/// Parses a color name or a `#rgb` / `#rrggbb` hex string (the `#` is optional).
pub fn parse_color(value: &str) -> Option<Rgb<u8>> {
    let value = value.trim().to_ascii_lowercase();

    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == value) {
        return Some(Rgb(*rgb));
    }

    let hex = value.strip_prefix('#').unwrap_or(&value);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (slot, digit) in rgb.iter_mut().zip(hex.chars()) {
                let nibble = digit.to_digit(16)? as u8;
                *slot = nibble * 17;
            }
            Some(Rgb(rgb))
        }
        6 => {
            let mut rgb = [0u8; 3];
            for (i, slot) in rgb.iter_mut().enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            Some(Rgb(rgb))
        }
        _ => None,
    }
}
