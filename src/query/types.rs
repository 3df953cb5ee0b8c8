//! Response views and error definitions for the query layer.

use crate::index::{IndexError, NoteChunk};
use serde::Serialize;
use thiserror::Error;

/// Guidance returned when `/which_patients` is called without a term.
pub const MISSING_DIAGNOSIS_MESSAGE: &str = "Provide ?diagnosis=...";
/// Guidance returned when `/query` is called with a blank question.
pub const MISSING_QUESTION_MESSAGE: &str =
    "Provide a non-empty \"q\", e.g. {\"q\": \"Which patients have pneumonia?\"}";
/// Guidance returned when no diagnosis term could be extracted from a question.
pub const EXTRACTION_MISS_MESSAGE: &str =
    "Could not extract diagnosis. Try: 'Which patients have pneumonia?'";
/// Generic failure reported by `/query` when the index could not answer.
pub const QUERY_FAILED_MESSAGE: &str =
    "Query failed. Try specific questions about patients or treatments.";
/// Empty-result marker of the treatment aggregation.
pub const NO_TREATMENTS_MESSAGE: &str = "No treatments found";

/// Errors surfaced by the query service to its callers.
#[derive(Debug, Error)]
pub enum QueryError {
    /// `/which_patients` was called without a usable diagnosis term.
    #[error("diagnosis term must not be empty")]
    MissingDiagnosis,
    /// `/query` was called with a blank question.
    #[error("question must not be empty")]
    MissingQuestion,
    /// The retrieval index failed to answer.
    #[error("Index lookup failed: {0}")]
    Index(#[from] IndexError),
}

/// One patient whose record matched a diagnosis lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosisMatch {
    /// Patient identifier.
    pub patient_id: String,
    /// Patient name.
    pub name: String,
    /// Patient age as stored.
    pub age: String,
    /// Diagnosis as stored in the metadata.
    pub diagnosis: String,
    /// Complete note text (the chunk text when no full note was stored).
    pub note: String,
}

/// Response of a direct diagnosis lookup.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisLookup {
    /// Term exactly as supplied by the caller.
    pub diagnosis_searched: String,
    /// First-seen record per matching patient.
    pub matches: Vec<DiagnosisMatch>,
    /// Number of matches.
    pub count: usize,
}

/// Most frequent treatment across distinct patients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreatmentSummary {
    /// Treatment with the highest frequency.
    pub most_common_treatment: String,
    /// Number of patients prescribed that treatment.
    pub frequency: usize,
    /// Number of patients contributing a treatment.
    pub total_analyzed: usize,
}

/// Outcome of the treatment aggregation; no treatments is a normal result, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreatmentReport {
    /// At least one treatment was recorded.
    Summary(TreatmentSummary),
    /// No patient carried a treatment value.
    NoTreatments {
        /// Always [`NO_TREATMENTS_MESSAGE`].
        error: String,
    },
}

impl TreatmentReport {
    /// Build the empty-result report.
    pub fn no_treatments() -> Self {
        Self::NoTreatments {
            error: NO_TREATMENTS_MESSAGE.to_string(),
        }
    }
}

/// One distinct patient seen during a full scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientOverview {
    /// Patient identifier.
    pub patient_id: String,
    /// Patient name.
    pub name: String,
    /// Diagnosis as stored.
    pub diagnosis: String,
    /// Treatment as stored.
    pub treatment: String,
}

/// Listing of every distinct patient in the index.
#[derive(Debug, Clone, Serialize)]
pub struct PatientDirectory {
    /// Number of distinct patients.
    pub total_patients: usize,
    /// Patients in first-seen order.
    pub patients: Vec<PatientOverview>,
}

/// Answer to a free-text question, tagged with the classified intent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Diagnosis lookup.
    WhichPatients {
        /// Diagnosis term extracted from the question.
        diagnosis: String,
        /// Matching patients.
        matches: Vec<DiagnosisMatch>,
        /// Number of matches.
        count: usize,
    },
    /// Treatment aggregation.
    MostCommonTreatment(TreatmentReport),
    /// Similarity search fallback.
    SemanticSearch {
        /// Best-ranked chunks, at most three.
        results: Vec<NoteChunk>,
    },
}

/// Reply of the `/query` endpoint: either an intent-tagged answer or a guidance/failure message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryReply {
    /// The question was answered.
    Answered(QueryOutcome),
    /// The question could not be answered.
    Failed {
        /// User-facing message.
        error: String,
    },
}

impl QueryReply {
    pub(crate) fn failed(message: &str) -> Self {
        Self::Failed {
            error: message.to_string(),
        }
    }
}

/// Reachability snapshot of the retrieval index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexHealth {
    /// Whether the index answered the probe.
    pub index_reachable: bool,
    /// Whether the note collection is present.
    pub collection_present: bool,
    /// Short diagnostic when the probe failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn treatment_outcome_serializes_flat_under_intent_tag() {
        let outcome = QueryOutcome::MostCommonTreatment(TreatmentReport::Summary(TreatmentSummary {
            most_common_treatment: "metformin".into(),
            frequency: 2,
            total_analyzed: 3,
        }));
        assert_eq!(
            serde_json::to_value(&outcome).expect("json"),
            json!({
                "intent": "most_common_treatment",
                "most_common_treatment": "metformin",
                "frequency": 2,
                "total_analyzed": 3
            })
        );

        let empty = QueryOutcome::MostCommonTreatment(TreatmentReport::no_treatments());
        assert_eq!(
            serde_json::to_value(&empty).expect("json"),
            json!({ "intent": "most_common_treatment", "error": "No treatments found" })
        );
    }

    #[test]
    fn failed_reply_serializes_as_error_object() {
        let reply = QueryReply::failed(EXTRACTION_MISS_MESSAGE);
        assert_eq!(
            serde_json::to_value(&reply).expect("json"),
            json!({ "error": EXTRACTION_MISS_MESSAGE })
        );
    }
}
