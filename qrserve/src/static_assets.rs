//! Embedded browser client.

use rust_embed::RustEmbed;

// Default storage directories live under static/ when the server runs from the crate root
#[derive(RustEmbed)]
#[folder = "static/"]
#[exclude = "qr/*"]
#[exclude = "uploads/*"]
pub struct Assets;
