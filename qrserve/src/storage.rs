//! On-disk storage for generated QR images and uploaded files.
//!
//! Every stored file is named `<uuid>.<ext>` with a freshly minted UUID, and is created with
//! create-new semantics: concurrent writers never share a path and callers never choose one.
//! Lookups only accept names of that exact shape, so a request path can never escape the
//! storage directory.
//!
//! The filename helpers ([`sanitize_filename`], [`allowed_extension`]) are pure and perform no I/O.

use std::{
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, instrument, warn};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::{Error, Result};

/// Which of the two storage directories a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// QR images produced by `/generate`
    Generated,
    /// Files received by `/upload`
    Uploads,
}

impl Area {
    fn resource(&self) -> &'static str {
        match self {
            Area::Generated => "QR code",
            Area::Uploads => "File",
        }
    }
}

/// A validated `<uuid>.<ext>` storage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub id: Uuid,
    pub extension: String,
}

impl StoredName {
    pub fn new(extension: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            extension: extension.to_ascii_lowercase(),
        }
    }

    /// Parses a name produced by [`StoredName::new`]. Returns `None` for anything else,
    /// including names with path separators or uppercase/unknown extensions.
    pub fn parse(name: &str, allowed_extensions: &[String]) -> Option<Self> {
        let (stem, extension) = name.rsplit_once('.')?;
        if !allowed_extensions.iter().any(|allowed| allowed == extension) {
            return None;
        }
        let id = Uuid::try_parse(stem).ok()?;
        // Only the canonical hyphenated form is ever produced
        if id.hyphenated().to_string() != stem {
            return None;
        }
        Some(Self {
            id,
            extension: extension.to_string(),
        })
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id.hyphenated(), self.extension)
    }
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub name: StoredName,
    pub size_bytes: u64,
}

/// Handle to the two storage directories. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    generated_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl Storage {
    /// Creates both directories if they do not exist yet.
    #[instrument(skip_all, fields(generated_dir = %config.generated_dir.display(), uploads_dir = %config.uploads_dir.display()))]
    pub async fn init(config: &StorageConfig) -> anyhow::Result<Self> {
        for dir in [&config.generated_dir, &config.uploads_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create storage directory {}: {}", dir.display(), e))?;
        }
        debug!("Storage directories ready");

        Ok(Self {
            generated_dir: config.generated_dir.clone(),
            uploads_dir: config.uploads_dir.clone(),
        })
    }

    pub fn dir(&self, area: Area) -> &Path {
        match area {
            Area::Generated => &self.generated_dir,
            Area::Uploads => &self.uploads_dir,
        }
    }

    /// Writes `bytes` under a new name with the given extension.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn save(&self, area: Area, extension: &str, bytes: &[u8]) -> Result<StoredFile> {
        let name = StoredName::new(extension);
        let path = self.dir(area).join(name.to_string());

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| Error::storage(format!("create {}", area.resource()), e))?;

        let write = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        };
        if let Err(e) = write.await {
            // Don't leave a truncated file behind
            let _ = fs::remove_file(&path).await;
            return Err(Error::storage(format!("write {}", area.resource()), e));
        }

        let size_bytes = fs::metadata(&path)
            .await
            .map_err(|e| Error::storage(format!("read {} metadata", area.resource()), e))?
            .len();

        info!(filename = %name, size_bytes, area = ?area, "Stored file");
        Ok(StoredFile { name, size_bytes })
    }

    /// Opens a stored file for streaming. Unknown names are [`Error::NotFound`].
    pub async fn open(&self, area: Area, name: &StoredName) -> Result<(fs::File, u64)> {
        let path = self.dir(area).join(name.to_string());
        let not_found = || Error::NotFound {
            resource: area.resource().to_string(),
            id: name.to_string(),
        };

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(Error::storage(format!("open {}", area.resource()), e)),
        };
        let metadata = file
            .metadata()
            .await
            .map_err(|e| Error::storage(format!("read {} metadata", area.resource()), e))?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        Ok((file, metadata.len()))
    }

    /// Deletes regular files in `area` last modified before `now - max_age`.
    ///
    /// Returns how many files were removed. Files that vanish mid-sweep are ignored.
    #[instrument(skip(self))]
    pub async fn sweep(&self, area: Area, max_age: Duration) -> Result<usize> {
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Ok(0);
        };

        let mut entries = fs::read_dir(self.dir(area))
            .await
            .map_err(|e| Error::storage("list storage directory", e))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage("list storage directory", e))?
        {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::storage("read file metadata", e)),
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().map_err(|e| Error::storage("read file modification time", e))?;
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove expired file"),
            }
        }

        Ok(removed)
    }
}

/// Reduces a client-supplied filename to a safe, informational form.
///
/// Path components are dropped and whitespace runs become `_`. Accented letters are reduced to
/// their ASCII base letter, then anything other than ASCII letters, digits, `_`, `.` and `-` is
/// removed and leading/trailing `.`/`_` are trimmed.
/// The result may be empty.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    // Compatibility decomposition splits accented letters into a base letter and a combining mark
    let kept: String = joined
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Returns the lowercase extension of `name` if it is in `allowed`.
///
/// Only the final path component is considered, and a leading dot alone (`.png`) does not
/// count as an extension.
pub fn allowed_extension(name: &str, allowed: &[String]) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let extension = extension.to_ascii_lowercase();
    allowed.iter().any(|a| *a == extension).then_some(extension)
}
