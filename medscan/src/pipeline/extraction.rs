//! Medicine entity extraction from normalized prescription text.
//!
//! Two implementations sit behind [`EntityExtractor`]:
//!
//! - [`SubprocessExtractor`] spawns `<interpreter> <script> <text>` once per upload and parses the
//!   JSON the script prints on stdout. This is how trained NER models are plugged in.
//! - [`RuleBasedExtractor`] runs in-process pattern rules for common prescription layouts
//!   (`1) TAB. NAME 1 Morning, 1 Night 5 Days`). It needs no interpreter and never fails.
//!
//! Both produce an [`ExtractionResult`] with the same shape as the script's JSON output:
//!
//! ```json
//! {"cleaned_text": "...", "medicines": [{"name": "TAB DOLO", "dosage": "1 Morning", "duration": "5 Days"}]}
//! ```

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{
    error::{PipelineError, Stage},
    process::{CaptureError, run_captured},
};

/// A medicine recognised in prescription text. Only `name` is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineCandidate {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, alias = "notificationId")]
    pub notification_id: Option<String>,
}

/// Parsed output of an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(alias = "input_text")]
    pub cleaned_text: String,
    pub medicines: Vec<MedicineCandidate>,
}

/// Finds medicine entities in normalized text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractionResult, PipelineError>;
}

/// Parse the JSON an extraction process printed on stdout.
pub fn parse_extraction_output(stdout: &[u8]) -> Result<ExtractionResult, PipelineError> {
    serde_json::from_slice(stdout).map_err(PipelineError::ExtractionOutputInvalid)
}

/// Runs an external script per request, passing the text as its only argument.
#[derive(Debug, Clone)]
pub struct SubprocessExtractor {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
}

impl SubprocessExtractor {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
        }
    }
}

#[async_trait]
impl EntityExtractor for SubprocessExtractor {
    #[instrument(skip(self, text), fields(interpreter = %self.interpreter, script = %self.script.display(), chars = text.len()), err)]
    async fn extract(&self, text: &str) -> Result<ExtractionResult, PipelineError> {
        let mut command = Command::new(&self.interpreter);
        command.arg(&self.script).arg(text);

        let output = run_captured(command, self.timeout).await.map_err(|e| match e {
            CaptureError::Spawn(e) => PipelineError::ExtractionProcessFailed {
                exit_code: None,
                stderr: format!("failed to start {}: {e}", self.interpreter),
            },
            CaptureError::Io(e) => PipelineError::ExtractionProcessFailed {
                exit_code: None,
                stderr: format!("failed to read process output: {e}"),
            },
            CaptureError::TimedOut => PipelineError::Timeout {
                stage: Stage::Extraction,
                after: self.timeout,
            },
        })?;

        if !output.status.success() {
            return Err(PipelineError::ExtractionProcessFailed {
                exit_code: output.status.code(),
                stderr: output.stderr_lossy(),
            });
        }

        if !output.stderr.is_empty() {
            debug!(stderr = %output.stderr_lossy(), "Extraction process wrote to stderr");
        }

        parse_extraction_output(&output.stdout)
    }
}

const TIME_OF_DAY: &str = "(?:Morning|Night|Evening|Afternoon)";

/// In-process extraction using fixed patterns for medicine name, dosage and duration.
#[derive(Debug, Clone)]
pub struct RuleBasedExtractor {
    entry_marker: Regex,
    injection_misread: Regex,
    name: Regex,
    dosage: Regex,
    duration: Regex,
}

impl RuleBasedExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            entry_marker: Regex::new(r"\b\d+\)")?,
            injection_misread: Regex::new(r"(?i)\bIN\)")?,
            name: Regex::new(r"(?i)\b(?:TAB|TABLET|CAP|CAPSULE|SYP|INJ)[.\s]*[A-Z0-9]+")?,
            dosage: Regex::new(&format!(r"(?i)\b\d+\s*{TIME_OF_DAY}(?:,\s*\d+\s*{TIME_OF_DAY})*"))?,
            duration: Regex::new(r"(?i)\b\d+\s*Days?\b")?,
        })
    }

    /// Flatten line breaks and repair the OCR misreads these prescriptions commonly produce.
    fn clean(&self, text: &str) -> String {
        let flattened = text.replace("\r\n", " ").replace('\n', " ");
        let repaired = flattened.trim().replace("NigBtDays", "Night 7 Days");
        self.injection_misread.replace_all(&repaired, "INJ").into_owned()
    }

    /// Split at every `<n>)` marker. Text before the first marker is its own entry.
    fn entries<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut starts: Vec<usize> = self.entry_marker.find_iter(text).map(|m| m.start()).collect();
        if starts.first() != Some(&0) {
            starts.insert(0, 0);
        }

        starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(text.len());
                &text[start..end]
            })
            .collect()
    }

    fn medicine(&self, entry: &str) -> Option<MedicineCandidate> {
        let name = self.name.find(entry)?.as_str().replace('.', "");
        Some(MedicineCandidate {
            name: name.trim().to_string(),
            dosage: self.dosage.find(entry).map(|m| m.as_str().to_string()),
            duration: self.duration.find(entry).map(|m| m.as_str().to_string()),
            notification_id: None,
        })
    }

    pub fn extract_sync(&self, text: &str) -> ExtractionResult {
        let cleaned_text = self.clean(text);
        let medicines = self.entries(&cleaned_text).into_iter().filter_map(|entry| self.medicine(entry)).collect();
        ExtractionResult { cleaned_text, medicines }
    }
}

#[async_trait]
impl EntityExtractor for RuleBasedExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionResult, PipelineError> {
        Ok(self.extract_sync(text))
    }
}
