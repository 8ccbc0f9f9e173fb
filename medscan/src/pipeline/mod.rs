//! Upload-processing pipeline: store → OCR → normalize → extract → cleanup.
//!
//! [`Pipeline::process`] owns the uploaded image from the moment it is written until the result
//! is returned. Every stage failure is terminal for the request and nothing is retried, but the
//! stored artifact is always deleted before `process` returns:
//!
//! ```text
//! Received ─▶ Stored ─▶ OcrRunning ─▶ OcrDone ─▶ ExtractionRunning ─▶ ExtractionDone ─▶ Responded
//!               │           │                           │
//!               └───────────┴───────────────────────────┴──▶ Cleanup ─▶ Responded
//! ```
//!
//! Oversized and empty uploads are rejected before anything is written. If the request future is
//! dropped mid-stage (client disconnect), a scope guard removes the artifact synchronously and the
//! child process is killed on drop.
//!
//! The external capabilities sit behind traits ([`ArtifactStore`], [`OcrEngine`],
//! [`EntityExtractor`]) so the orchestrator can be exercised with in-memory fakes.

pub mod artifacts;
pub mod error;
pub mod extraction;
pub mod normalize;
pub mod ocr;
mod process;

use bytes::Bytes;
use metrics::{counter, histogram};
use scopeguard::ScopeGuard;
use std::{sync::Arc, time::Instant};
use tracing::{debug, error, info, instrument, warn};

pub use artifacts::{ArtifactStore, DiskArtifactStore, StoredArtifact, artifact_extension};
pub use error::{PipelineError, Stage};
pub use extraction::{EntityExtractor, ExtractionResult, MedicineCandidate, RuleBasedExtractor, SubprocessExtractor};
pub use normalize::normalize_text;
pub use ocr::{OcrEngine, TesseractEngine};

use crate::config::{Config, ExtractionConfig};

/// One upload, as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Stable key of the authenticated caller (their email)
    pub owner: String,
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Successful pipeline result: the raw OCR text plus the extractor's view of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub ocr_text: String,
    pub cleaned_text: String,
    pub medicines: Vec<MedicineCandidate>,
}

/// Sequences the pipeline stages and owns the artifact lifecycle.
pub struct Pipeline {
    store: Arc<dyn ArtifactStore>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn EntityExtractor>,
    max_file_size: u64,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("max_file_size", &self.max_file_size).finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        ocr: Arc<dyn OcrEngine>,
        extractor: Arc<dyn EntityExtractor>,
        max_file_size: u64,
    ) -> Self {
        Self {
            store,
            ocr,
            extractor,
            max_file_size,
        }
    }

    /// Production wiring: disk store, tesseract, and the configured extractor.
    ///
    /// The upload directory is not created here; see [`DiskArtifactStore::ensure_root`].
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(DiskArtifactStore::new(&config.uploads.dir));
        let ocr = Arc::new(TesseractEngine::new(&config.ocr.command, &config.ocr.language, config.ocr.timeout));

        let extractor: Arc<dyn EntityExtractor> = match &config.extraction {
            ExtractionConfig::Subprocess {
                interpreter,
                script,
                timeout,
            } => Arc::new(SubprocessExtractor::new(interpreter, script, *timeout)),
            ExtractionConfig::Builtin => Arc::new(RuleBasedExtractor::new()?),
        };

        Ok(Self::new(store, ocr, extractor, config.uploads.max_file_size))
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Run one upload through every stage.
    #[instrument(skip_all, fields(owner = %request.owner, size = request.bytes.len()))]
    pub async fn process(&self, request: UploadRequest) -> Result<ExtractionOutcome, PipelineError> {
        let result = self.run(request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        counter!("medscan_uploads_total", "outcome" => outcome).increment(1);

        result
    }

    async fn run(&self, request: UploadRequest) -> Result<ExtractionOutcome, PipelineError> {
        if request.bytes.is_empty() {
            return Err(PipelineError::NoFile);
        }

        let size = request.bytes.len() as u64;
        if size > self.max_file_size {
            return Err(PipelineError::PayloadTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let extension = artifact_extension(request.filename.as_deref(), request.content_type.as_deref());
        let artifact = self
            .store
            .store(&request.bytes, &extension)
            .await
            .map_err(PipelineError::ArtifactWrite)?;
        info!(artifact = %artifact.path.display(), "Upload stored");

        // Only fires if this future is dropped before the explicit release below
        let store = Arc::clone(&self.store);
        let guard = scopeguard::guard(artifact, move |artifact| {
            warn!(artifact = %artifact.path.display(), "Pipeline abandoned mid-stage, removing artifact");
            if let Err(e) = store.delete_blocking(&artifact) {
                error!(artifact = %artifact.path.display(), error = %e, "Artifact cleanup failed");
            }
        });

        let result = self.run_stages(&guard).await;

        let artifact = ScopeGuard::into_inner(guard);
        self.release(&artifact).await;

        match &result {
            Ok(outcome) => info!(medicine_count = outcome.medicines.len(), "Upload processed"),
            Err(e) => warn!(error = %e, kind = e.kind(), "Upload processing failed"),
        }
        result
    }

    async fn run_stages(&self, artifact: &StoredArtifact) -> Result<ExtractionOutcome, PipelineError> {
        let started = Instant::now();
        debug!(stage = %Stage::Ocr, "Stage started");
        let ocr_text = self.ocr.recognize(&artifact.path).await?;
        let elapsed = started.elapsed();
        histogram!("medscan_pipeline_stage_seconds", "stage" => Stage::Ocr.as_str()).record(elapsed.as_secs_f64());
        info!(stage = %Stage::Ocr, elapsed_ms = elapsed.as_millis() as u64, chars = ocr_text.len(), "Stage finished");

        let normalized = normalize_text(&ocr_text);

        let started = Instant::now();
        debug!(stage = %Stage::Extraction, "Stage started");
        let extraction = self.extractor.extract(&normalized).await?;
        let elapsed = started.elapsed();
        histogram!("medscan_pipeline_stage_seconds", "stage" => Stage::Extraction.as_str()).record(elapsed.as_secs_f64());
        info!(
            stage = %Stage::Extraction,
            elapsed_ms = elapsed.as_millis() as u64,
            medicine_count = extraction.medicines.len(),
            "Stage finished"
        );

        Ok(ExtractionOutcome {
            ocr_text,
            cleaned_text: extraction.cleaned_text,
            medicines: extraction.medicines,
        })
    }

    /// Delete the artifact. A failure here never changes the already computed result.
    async fn release(&self, artifact: &StoredArtifact) {
        match self.store.delete(artifact).await {
            Ok(()) => debug!(artifact = %artifact.path.display(), "Artifact removed"),
            Err(e) => error!(
                artifact = %artifact.path.display(),
                error = %e,
                "Artifact cleanup failed"
            ),
        }
    }
}
