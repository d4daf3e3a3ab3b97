//! Blob storage for uploaded files (post thumbnails).
//!
//! Paths are relative to the disk root, e.g. `posts/3k9...Qz.png`.

use async_trait::async_trait;
use bytes::Bytes;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

const HASH_NAME_LEN: usize = 25;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Path escapes the storage root: {0}")]
    InvalidPath(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A named disk that stores and removes blobs by relative path.
#[async_trait]
pub trait FileStorage: Send + Sync {
    fn disk(&self) -> &str;

    async fn put(&self, path: &str, contents: Bytes) -> Result<(), StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// A file part received with a request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size_kilobytes(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }

    /// Extension derived from the file contents, not the client-supplied name.
    pub fn guess_extension(&self) -> Option<&'static str> {
        let b = &self.bytes[..];
        if b.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some("png")
        } else if b.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some("jpg")
        } else if b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a") {
            Some("gif")
        } else if b.starts_with(b"BM") {
            Some("bmp")
        } else if b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WEBP" {
            Some("webp")
        } else if looks_like_svg(b) {
            Some("svg")
        } else {
            None
        }
    }

    pub fn is_image(&self) -> bool {
        self.guess_extension().is_some()
    }

    /// `posts/<25 random alphanumerics>.<ext>`
    pub fn hash_name(&self, directory: &str) -> String {
        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(HASH_NAME_LEN)
            .map(char::from)
            .collect();
        let directory = directory.trim_end_matches('/');
        match self.guess_extension().map(str::to_string).or_else(|| self.client_extension()) {
            Some(ext) => format!("{}/{}.{}", directory, name, ext),
            None => format!("{}/{}", directory, name),
        }
    }

    /// Lowercased extension of the client-supplied filename.
    pub fn client_extension(&self) -> Option<String> {
        let filename = self.filename.as_deref()?;
        let ext = Path::new(filename).extension()?.to_str()?;
        if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(ext.to_ascii_lowercase())
        } else {
            None
        }
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let text = text.trim_start().to_ascii_lowercase();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

/// Public URL of a stored file.
pub fn public_url(app_url: &str, path: &str) -> String {
    format!("{}/storage/{}", app_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn checked_relative(path: &str) -> Result<PathBuf, StorageError> {
    let relative = Path::new(path);
    let clean = relative.components().all(|c| matches!(c, Component::Normal(_)));
    if path.is_empty() || !clean {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(relative.to_path_buf())
}

/// Disk rooted at a local directory.
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(checked_relative(path)?))
    }
}

#[async_trait]
impl FileStorage for LocalDisk {
    fn disk(&self) -> &str {
        &self.name
    }

    async fn put(&self, path: &str, contents: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        let io = |source: std::io::Error| StorageError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        tokio::fs::write(&target, &contents).await.map_err(io)?;
        tracing::debug!(disk = %self.name, path, bytes = contents.len(), "stored file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(path.to_string())),
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Disk held in memory, for tests and database-less runs.
#[derive(Default)]
pub struct MemoryDisk {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileStorage for MemoryDisk {
    fn disk(&self) -> &str {
        "memory"
    }

    async fn put(&self, path: &str, contents: Bytes) -> Result<(), StorageError> {
        checked_relative(path)?;
        self.files.write().await.insert(path.to_string(), contents);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        match self.files.write().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }
}
