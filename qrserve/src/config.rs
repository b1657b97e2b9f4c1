//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `QRSERVE_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `QRSERVE_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `QRSERVE_STORAGE__GENERATED_DIR=/var/lib/qrserve/qr` sets the `storage.generated_dir` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use qrserve::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Storage**: `storage.generated_dir`, `storage.uploads_dir` - where artifacts are written
//! - **Uploads**: `uploads.allowed_extensions` - extension allow-list for `/upload`
//! - **Limits**: `limits.max_body_size` - request body cap in bytes
//! - **Generation**: `generation.*` - defaults for QR rendering
//! - **Decoding**: `decode.enabled` - whether `/decode` is served
//! - **Retention**: `retention.max_age`, `retention.sweep_interval` - optional cleanup of old files
//! - **Features**: `enable_metrics`, `enable_otel_export`
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! QRSERVE_PORT=8080
//! QRSERVE_DECODE__ENABLED=false
//! QRSERVE_RETENTION__MAX_AGE=7d
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;
use crate::qr::{ErrorCorrection, parse_color};

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "QRSERVE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// On-disk locations for generated and uploaded files
    pub storage: StorageConfig,
    /// Upload validation settings
    pub uploads: UploadsConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Defaults and bounds for QR generation
    pub generation: GenerationConfig,
    /// QR decoding capability
    pub decode: DecodeConfig,
    /// Optional cleanup of stored files
    pub retention: RetentionConfig,
    /// Cross-origin settings for browser clients served from elsewhere
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Storage directories.
///
/// Both directories are created at startup if missing. They must not be the same directory,
/// since retrieval endpoints resolve names against one directory each.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory for generated QR images (default: static/qr)
    pub generated_dir: PathBuf,
    /// Directory for uploaded images (default: static/uploads)
    pub uploads_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            generated_dir: PathBuf::from("static/qr"),
            uploads_dir: PathBuf::from("static/uploads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    /// Lowercase file extensions accepted by `/upload` (default: png, jpg, jpeg)
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Resource limits.
///
/// Oversized requests are rejected outright with HTTP 413 rather than streamed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    /// Default: 4MB
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// Defaults applied to `/generate` requests that omit styling options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Output edge length in pixels when the request has no `size` (default: 200)
    pub default_size: u32,
    /// Largest accepted `size` (default: 2000)
    pub max_size: u32,
    /// Dark module color (default: black)
    pub default_foreground: String,
    /// Light module color (default: white)
    pub default_background: String,
    /// Error-correction level when the request has none (default: M)
    pub default_error_correction: ErrorCorrection,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_size: 200,
            max_size: 2000,
            default_foreground: "black".to_string(),
            default_background: "white".to_string(),
            default_error_correction: ErrorCorrection::M,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeConfig {
    /// Serve `/decode` (default: true). Has no effect when the `decode` feature is compiled out.
    pub enabled: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DecodeConfig {
    /// Whether decoding can actually be performed by this build with this configuration
    pub fn is_available(&self) -> bool {
        self.enabled && cfg!(feature = "decode")
    }
}

/// Retention policy for stored files.
///
/// When `max_age` is unset (the default) files accumulate indefinitely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    /// Files older than this are deleted by the sweeper (e.g. "7d", "12h")
    #[serde(with = "humantime_serde")]
    pub max_age: Option<Duration>,
    /// How often the sweeper runs (default: 10m)
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: None,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to call the API from a browser
    pub allowed_origins: Vec<CorsOrigin>,
    /// Preflight cache duration in seconds
    pub max_age: Option<u64>,
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://qr.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            storage: StorageConfig::default(),
            uploads: UploadsConfig::default(),
            limits: LimitsConfig::default(),
            generation: GenerationConfig::default(),
            decode: DecodeConfig::default(),
            retention: RetentionConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // Extension matching is case-insensitive, so store the allow-list lowercased
        for ext in &mut config.uploads.allowed_extensions {
            *ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.limits.max_body_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: limits.max_body_size cannot be 0".to_string(),
            });
        }

        if self.uploads.allowed_extensions.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: uploads.allowed_extensions cannot be empty".to_string(),
            });
        }

        for ext in &self.uploads.allowed_extensions {
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: invalid extension '{ext}' in uploads.allowed_extensions (use lowercase letters and digits only)"
                    ),
                });
            }
        }

        if self.generation.default_size == 0 || self.generation.default_size > self.generation.max_size {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: generation.default_size ({}) must be between 1 and generation.max_size ({})",
                    self.generation.default_size, self.generation.max_size
                ),
            });
        }

        let foreground = parse_color(&self.generation.default_foreground).ok_or_else(|| Error::Internal {
            operation: format!(
                "Config validation: unknown color '{}' for generation.default_foreground",
                self.generation.default_foreground
            ),
        })?;
        let background = parse_color(&self.generation.default_background).ok_or_else(|| Error::Internal {
            operation: format!(
                "Config validation: unknown color '{}' for generation.default_background",
                self.generation.default_background
            ),
        })?;
        if foreground == background {
            return Err(Error::Internal {
                operation: "Config validation: generation.default_foreground and generation.default_background must differ".to_string(),
            });
        }

        if self.storage.generated_dir == self.storage.uploads_dir {
            return Err(Error::Internal {
                operation: "Config validation: storage.generated_dir and storage.uploads_dir must be different directories".to_string(),
            });
        }

        if self.retention.sweep_interval.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: retention.sweep_interval cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values
            .merge(Env::prefixed("QRSERVE_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
