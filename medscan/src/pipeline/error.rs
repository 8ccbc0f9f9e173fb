//! Failure kinds for the upload-processing pipeline.

use std::{fmt, time::Duration};
use thiserror::Error;

/// Pipeline stage that runs an external capability and can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ocr,
    Extraction,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ocr => "ocr",
            Stage::Extraction => "extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a single upload.
///
/// The `Display` output carries diagnostic detail (stderr, parse errors) and is meant for logs.
/// Callers get the generic text from [`crate::errors::Error::user_message`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request carried no image, or an empty one
    #[error("no file was uploaded")]
    NoFile,

    /// The image is larger than the configured limit; nothing was written
    #[error("upload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },

    /// The artifact could not be written to the store
    #[error("failed to store upload artifact: {0}")]
    ArtifactWrite(#[source] std::io::Error),

    /// The OCR engine could not be started, failed, or produced nothing usable
    #[error("OCR failed: {message}")]
    OcrFailed { message: String },

    /// The extraction process exited unsuccessfully
    #[error("extraction process {}: {stderr}", describe_exit(.exit_code))]
    ExtractionProcessFailed { exit_code: Option<i32>, stderr: String },

    /// The extraction process succeeded but its stdout is not the expected JSON
    #[error("extraction output is invalid: {0}")]
    ExtractionOutputInvalid(#[source] serde_json::Error),

    /// An external stage ran past its time limit and was killed
    #[error("{stage} stage timed out after {}", format_secs(.after))]
    Timeout { stage: Stage, after: Duration },
}

impl PipelineError {
    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NoFile => "no_file",
            PipelineError::PayloadTooLarge { .. } => "payload_too_large",
            PipelineError::ArtifactWrite(_) => "artifact_write",
            PipelineError::OcrFailed { .. } => "ocr_failed",
            PipelineError::ExtractionProcessFailed { .. } => "extraction_process_failed",
            PipelineError::ExtractionOutputInvalid(_) => "extraction_output_invalid",
            PipelineError::Timeout { .. } => "timeout",
        }
    }

    /// Whether the failure was caused by the request itself rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::NoFile | PipelineError::PayloadTooLarge { .. })
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated without an exit code".to_string(),
    }
}

fn format_secs(after: &Duration) -> String {
    format!("{}s", after.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_failure_message_includes_diagnostics() {
        let err = PipelineError::ExtractionProcessFailed {
            exit_code: Some(1),
            stderr: "model not found".to_string(),
        };
        assert_eq!(err.to_string(), "extraction process exited with code 1: model not found");

        let killed = PipelineError::ExtractionProcessFailed {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("without an exit code"));
    }

    #[test]
    fn test_timeout_message_names_stage() {
        let err = PipelineError::Timeout {
            stage: Stage::Ocr,
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "ocr stage timed out after 1.5s");
    }

    #[test]
    fn test_client_errors() {
        assert!(PipelineError::NoFile.is_client_error());
        assert!(PipelineError::PayloadTooLarge { size: 2, max: 1 }.is_client_error());
        assert!(!PipelineError::OcrFailed { message: "x".into() }.is_client_error());
    }
}
