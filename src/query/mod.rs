//! Query layer: diagnosis matching, treatment aggregation, and intent classification.

pub mod intent;
pub mod matcher;
mod service;
pub mod treatment;
pub mod types;

pub use intent::{Intent, classify, extract_diagnosis};
pub use matcher::{SynonymError, SynonymTable, find_by_diagnosis};
pub use service::{NoteQueryService, QueryApi, SEMANTIC_SEARCH_K, StartupError};
pub use treatment::{list_patients, most_common_treatment};
pub use types::{
    DiagnosisLookup, DiagnosisMatch, IndexHealth, PatientDirectory, PatientOverview, QueryError,
    QueryOutcome, QueryReply, TreatmentReport, TreatmentSummary,
};
