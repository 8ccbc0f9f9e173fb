//! Response model for `POST /upload`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::{ExtractionOutcome, MedicineCandidate};

/// A medicine the extractor found. Absent fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicineCandidateResponse {
    pub name: String,
    pub dosage: Option<String>,
    pub duration: Option<String>,
    pub notification_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Raw text recognised in the image, before normalization
    pub ocr_text: String,
    /// Text as returned by the extractor
    pub cleaned_text: String,
    pub medicines: Vec<MedicineCandidateResponse>,
}

impl From<MedicineCandidate> for MedicineCandidateResponse {
    fn from(candidate: MedicineCandidate) -> Self {
        Self {
            name: candidate.name,
            dosage: candidate.dosage,
            duration: candidate.duration,
            notification_id: candidate.notification_id,
        }
    }
}

impl From<ExtractionOutcome> for UploadResponse {
    fn from(outcome: ExtractionOutcome) -> Self {
        Self {
            ocr_text: outcome.ocr_text,
            cleaned_text: outcome.cleaned_text,
            medicines: outcome.medicines.into_iter().map(Into::into).collect(),
        }
    }
}
