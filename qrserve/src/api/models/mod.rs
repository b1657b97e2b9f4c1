//! Request and response bodies for the HTTP API.

pub mod qr;
pub mod uploads;
