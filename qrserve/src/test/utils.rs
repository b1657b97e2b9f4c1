use std::path::Path;

use axum_test::TestServer;

use crate::{Application, BackgroundServices, config::Config};

/// Defaults with storage inside `dir` and a small body limit.
pub fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.generated_dir = dir.join("qr");
    config.storage.uploads_dir = dir.join("uploads");
    config.limits.max_body_size = 256 * 1024;
    config
}

pub async fn create_test_app(config: Config) -> (TestServer, BackgroundServices) {
    Application::new(config)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Names of the files currently in `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("storage directory should exist")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// A PNG with no QR code in it.
pub fn plain_png() -> Vec<u8> {
    let image = image::RgbImage::from_fn(120, 80, |x, y| image::Rgb([(x * 2) as u8, (y * 3) as u8, 90]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}
