//! Optical character recognition over stored artifacts.

use async_trait::async_trait;
use std::{path::Path, time::Duration};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{
    error::{PipelineError, Stage},
    process::{CaptureError, run_captured},
};

/// Turns an image on disk into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<String, PipelineError>;
}

/// OCR through the `tesseract` command line tool.
///
/// Runs `<command> <image> stdout -l <language>` and takes the text from stdout.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(skip(self), fields(language = %self.language), err)]
    async fn recognize(&self, image: &Path) -> Result<String, PipelineError> {
        let mut command = Command::new(&self.command);
        command.arg(image).arg("stdout").arg("-l").arg(&self.language);

        let output = run_captured(command, self.timeout).await.map_err(|e| match e {
            CaptureError::Spawn(e) => PipelineError::OcrFailed {
                message: format!("failed to start {}: {e}", self.command),
            },
            CaptureError::Io(e) => PipelineError::OcrFailed {
                message: format!("failed to read OCR output: {e}"),
            },
            CaptureError::TimedOut => PipelineError::Timeout {
                stage: Stage::Ocr,
                after: self.timeout,
            },
        })?;

        if !output.status.success() {
            return Err(PipelineError::OcrFailed {
                message: format!("{} exited with {}: {}", self.command, output.status, output.stderr_lossy()),
            });
        }

        // tesseract reports progress and warnings on stderr even when it succeeds
        if !output.stderr.is_empty() {
            debug!(stderr = %output.stderr_lossy(), "tesseract diagnostics");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
