//! Transient storage for uploaded images while they are being processed.
//!
//! An artifact lives exactly as long as one pipeline run: the orchestrator writes it, hands its
//! path to the OCR engine, and deletes it before the response is produced. Names are unique for
//! the lifetime of the process (millisecond timestamp plus a process-wide sequence number), and
//! files are opened with `create_new` so two uploads can never share a file.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Extension used when neither the filename nor the content type yields one.
pub const DEFAULT_EXTENSION: &str = "bin";

const MAX_EXTENSION_LEN: usize = 8;

/// Handle to a stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Storage backend for upload artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `bytes` under a freshly generated name ending in `extension`.
    async fn store(&self, bytes: &[u8], extension: &str) -> io::Result<StoredArtifact>;

    /// Remove a stored artifact. Removing one that no longer exists is an error.
    async fn delete(&self, artifact: &StoredArtifact) -> io::Result<()>;

    /// Synchronous removal, for use from drop paths where nothing can be awaited.
    fn delete_blocking(&self, artifact: &StoredArtifact) -> io::Result<()>;
}

/// Artifact store backed by a local directory.
#[derive(Debug)]
pub struct DiskArtifactStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl DiskArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn next_path(&self, extension: &str) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}.{}", Utc::now().timestamp_millis(), sequence, sanitize_extension(extension));
        self.root.join(name)
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn store(&self, bytes: &[u8], extension: &str) -> io::Result<StoredArtifact> {
        let path = self.next_path(extension);
        let mut file = tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            // Partially written files must not outlive the failed request
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        debug!(path = %path.display(), "Artifact written");
        Ok(StoredArtifact {
            path,
            size_bytes: bytes.len() as u64,
        })
    }

    async fn delete(&self, artifact: &StoredArtifact) -> io::Result<()> {
        tokio::fs::remove_file(&artifact.path).await
    }

    fn delete_blocking(&self, artifact: &StoredArtifact) -> io::Result<()> {
        std::fs::remove_file(&artifact.path)
    }
}

/// Reduce a user-supplied extension to lowercase ASCII alphanumerics.
pub fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        cleaned
    }
}

/// Pick the artifact extension for an upload.
///
/// The declared filename wins; otherwise the content type is mapped through `mime_guess`.
pub fn artifact_extension(filename: Option<&str>, content_type: Option<&str>) -> String {
    let from_filename = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_string);

    let from_content_type = || {
        content_type
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
    };

    match from_filename.or_else(from_content_type) {
        Some(ext) => sanitize_extension(&ext),
        None => DEFAULT_EXTENSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("PNG"), "png");
        assert_eq!(sanitize_extension("../../etc"), "etc");
        assert_eq!(sanitize_extension(""), "bin");
        assert_eq!(sanitize_extension("..."), "bin");
        assert_eq!(sanitize_extension("averyveryverylongext"), "averyver");
    }

    #[test]
    fn test_artifact_extension_prefers_filename() {
        assert_eq!(artifact_extension(Some("scan.JPG"), Some("image/png")), "jpg");
        assert_eq!(artifact_extension(Some("scan"), Some("image/png")), "png");
        assert_eq!(artifact_extension(None, None), "bin");
        assert_eq!(artifact_extension(Some("noext"), None), "bin");
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path());

        let artifact = store.store(b"image-bytes", "png").await.unwrap();
        assert!(artifact.path.starts_with(dir.path()));
        assert_eq!(artifact.size_bytes, 11);
        assert_eq!(artifact.path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(tokio::fs::read(&artifact.path).await.unwrap(), b"image-bytes");

        store.delete(&artifact).await.unwrap();
        assert!(!artifact.path.exists());

        // A second delete targets a missing file and must report it
        assert!(store.delete(&artifact).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_stores_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskArtifactStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..32u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.store(&[i], "png").await.unwrap() }));
        }

        let mut paths = HashSet::new();
        for handle in handles {
            paths.insert(handle.await.unwrap().path);
        }
        assert_eq!(paths.len(), 32);
    }

    #[tokio::test]
    async fn test_store_fails_when_root_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskArtifactStore::new(dir.path().join("missing"));
        assert!(store.store(b"x", "png").await.is_err());

        store.ensure_root().await.unwrap();
        let artifact = store.store(b"x", "png").await.unwrap();
        store.delete_blocking(&artifact).unwrap();
        assert!(!artifact.path.exists());
    }
}
