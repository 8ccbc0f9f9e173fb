//! Test utilities shared by handler and router tests.
//!
//! Most tests run without PostgreSQL: the pool from [`lazy_pool`] never connects unless a query is
//! issued, and the pipeline from [`create_test_pipeline`] replaces OCR with a file read so the
//! uploaded bytes become the recognised text.

use crate::{
    AppState,
    config::{Config, ExtractionConfig, PoolSettings},
    pipeline::{DiskArtifactStore, OcrEngine, Pipeline, PipelineError, RuleBasedExtractor},
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        extraction: ExtractionConfig::Builtin,
        enable_metrics: false,
        ..Default::default()
    };

    config.database.url = "postgres://localhost:5432/medscan_test".to_string();
    config.database.pool = PoolSettings {
        max_connections: 1,
        min_connections: 0,
        ..Default::default()
    };
    config
}

/// A pool that only connects if a test actually touches the database.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://localhost:5432/medscan_test")
        .expect("valid connection string")
}

/// OCR stand-in that returns the uploaded file's contents as text.
pub struct FileContentsOcr;

#[async_trait]
impl OcrEngine for FileContentsOcr {
    async fn recognize(&self, image: &Path) -> Result<String, PipelineError> {
        tokio::fs::read_to_string(image).await.map_err(|e| PipelineError::OcrFailed { message: e.to_string() })
    }
}

/// Disk-backed pipeline with file-read OCR and the built-in extractor.
///
/// The upload directory is not created here. Tests that upload point `uploads.dir` at a
/// `tempfile::TempDir` they own.
pub fn create_test_pipeline(upload_dir: &Path, max_file_size: u64) -> Pipeline {
    Pipeline::new(
        Arc::new(DiskArtifactStore::new(upload_dir)),
        Arc::new(FileContentsOcr),
        Arc::new(RuleBasedExtractor::new().expect("built-in patterns compile")),
        max_file_size,
    )
}

pub fn create_test_state(config: Config) -> AppState {
    create_test_state_with_pool(config, lazy_pool())
}

pub fn create_test_state_with_pool(config: Config, pool: PgPool) -> AppState {
    let pipeline = create_test_pipeline(&config.uploads.dir, config.uploads.max_file_size);
    AppState::builder().db(pool).config(config).pipeline(Arc::new(pipeline)).build()
}

/// Files currently present in an upload directory.
pub fn upload_dir_entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_leaves_upload_dir_untouched() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.uploads.dir = scratch.path().join("uploads");

        let _state = create_test_state(config.clone());
        assert!(!config.uploads.dir.exists());
    }
}
