//! Query service coordinating the retrieval index, matchers, and intent classifier.

use super::{
    intent::{Intent, classify, extract_diagnosis},
    matcher::{SynonymError, SynonymTable, find_by_diagnosis},
    treatment::{list_patients, most_common_treatment},
    types::{
        DiagnosisLookup, DiagnosisMatch, EXTRACTION_MISS_MESSAGE, IndexHealth, PatientDirectory,
        QUERY_FAILED_MESSAGE, QueryError, QueryOutcome, QueryReply, TreatmentReport,
    },
};
use crate::{
    config::get_config,
    index::{IndexError, QdrantIndex, RetrievalIndex},
    metrics::{MetricsSnapshot, QueryKind, QueryMetrics},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Number of chunks returned by the semantic search fallback.
pub const SEMANTIC_SEARCH_K: usize = 3;

/// Errors raised while assembling the service at start-up.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The retrieval index could not be opened.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// The configured synonym file could not be loaded.
    #[error(transparent)]
    Synonyms(#[from] SynonymError),
}

/// Abstraction over the query layer used by the HTTP surface.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Find the patients matching a diagnosis term.
    async fn which_patients(&self, diagnosis: &str) -> Result<DiagnosisLookup, QueryError>;

    /// Aggregate the most common treatment.
    async fn most_common_treatment(&self) -> Result<TreatmentReport, QueryError>;

    /// Classify and answer a free-text question. Index failures are folded into the reply.
    async fn answer(&self, question: &str) -> Result<QueryReply, QueryError>;

    /// List every distinct patient in the index.
    async fn list_patients(&self) -> Result<PatientDirectory, QueryError>;

    /// Probe the retrieval index.
    async fn health(&self) -> IndexHealth;

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Read-only query service over a retrieval index.
///
/// Holds no mutable state besides counters: every lookup re-scans the index, so answers always
/// reflect the stored chunks. Construct once at start-up and share through an `Arc`.
pub struct NoteQueryService {
    index: Arc<dyn RetrievalIndex>,
    synonyms: SynonymTable,
    metrics: QueryMetrics,
}

impl NoteQueryService {
    /// Build a service over an existing index.
    pub fn new(index: Arc<dyn RetrievalIndex>, synonyms: SynonymTable) -> Self {
        Self {
            index,
            synonyms,
            metrics: QueryMetrics::new(),
        }
    }

    /// Open the configured Qdrant index and synonym table.
    pub async fn from_config() -> Result<Self, StartupError> {
        let config = get_config();
        let synonyms = match &config.diagnosis_synonyms_file {
            Some(path) => SynonymTable::with_file(path)?,
            None => SynonymTable::default(),
        };
        let index = QdrantIndex::connect().await?;
        Ok(Self::new(Arc::new(index), synonyms))
    }

    async fn find_matches(&self, diagnosis: &str) -> Result<Vec<DiagnosisMatch>, IndexError> {
        let chunks = self.index.scan_all().await?;
        Ok(find_by_diagnosis(&chunks, diagnosis, &self.synonyms))
    }

    async fn aggregate_treatments(&self) -> Result<TreatmentReport, IndexError> {
        let chunks = self.index.scan_all().await?;
        Ok(most_common_treatment(&chunks))
    }

    async fn classified_answer(&self, question: &str) -> Result<QueryReply, IndexError> {
        let lowered = question.to_lowercase();
        let intent = classify(&lowered);
        tracing::debug!(intent = intent.as_str(), "Classified question");

        let outcome = match intent {
            Intent::WhichPatients => {
                let Some(diagnosis) = extract_diagnosis(&lowered) else {
                    tracing::info!("No diagnosis term extracted from question");
                    self.metrics.record_failure();
                    return Ok(QueryReply::failed(EXTRACTION_MISS_MESSAGE));
                };
                let matches = self.find_matches(&diagnosis).await?;
                self.metrics.record(QueryKind::DiagnosisLookup);
                tracing::info!(diagnosis = %diagnosis, matches = matches.len(), "Answered diagnosis question");
                QueryOutcome::WhichPatients {
                    diagnosis,
                    count: matches.len(),
                    matches,
                }
            }
            Intent::MostCommonTreatment => {
                let report = self.aggregate_treatments().await?;
                self.metrics.record(QueryKind::TreatmentAggregation);
                QueryOutcome::MostCommonTreatment(report)
            }
            Intent::SemanticSearch => {
                let results = self
                    .index
                    .similarity_search(question, SEMANTIC_SEARCH_K)
                    .await?;
                self.metrics.record(QueryKind::SemanticSearch);
                tracing::info!(results = results.len(), "Answered with similarity search");
                QueryOutcome::SemanticSearch { results }
            }
        };

        Ok(QueryReply::Answered(outcome))
    }

    fn index_failure(&self, operation: &str, error: IndexError) -> QueryError {
        self.metrics.record_failure();
        tracing::error!(operation, error = %error, "Index request failed");
        QueryError::Index(error)
    }
}

#[async_trait]
impl QueryApi for NoteQueryService {
    async fn which_patients(&self, diagnosis: &str) -> Result<DiagnosisLookup, QueryError> {
        if diagnosis.trim().is_empty() {
            self.metrics.record_failure();
            return Err(QueryError::MissingDiagnosis);
        }

        let matches = self
            .find_matches(diagnosis)
            .await
            .map_err(|error| self.index_failure("which_patients", error))?;
        self.metrics.record(QueryKind::DiagnosisLookup);
        tracing::info!(diagnosis, matches = matches.len(), "Diagnosis lookup completed");

        Ok(DiagnosisLookup {
            diagnosis_searched: diagnosis.to_string(),
            count: matches.len(),
            matches,
        })
    }

    async fn most_common_treatment(&self) -> Result<TreatmentReport, QueryError> {
        let report = self
            .aggregate_treatments()
            .await
            .map_err(|error| self.index_failure("most_common_treatment", error))?;
        self.metrics.record(QueryKind::TreatmentAggregation);
        Ok(report)
    }

    async fn answer(&self, question: &str) -> Result<QueryReply, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            self.metrics.record_failure();
            return Err(QueryError::MissingQuestion);
        }

        match self.classified_answer(question).await {
            Ok(reply) => Ok(reply),
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(error = %error, "Question could not be answered");
                Ok(QueryReply::failed(QUERY_FAILED_MESSAGE))
            }
        }
    }

    async fn list_patients(&self) -> Result<PatientDirectory, QueryError> {
        let chunks = self
            .index
            .scan_all()
            .await
            .map_err(|error| self.index_failure("list_patients", error))?;
        let patients = list_patients(&chunks);
        self.metrics.record(QueryKind::PatientListing);
        Ok(PatientDirectory {
            total_patients: patients.len(),
            patients,
        })
    }

    async fn health(&self) -> IndexHealth {
        match self.index.exists().await {
            Ok(present) => IndexHealth {
                index_reachable: true,
                collection_present: present,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Index health probe failed");
                IndexHealth {
                    index_reachable: false,
                    collection_present: false,
                    error: Some("Index unreachable".to_string()),
                }
            }
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::HashingEmbeddingClient,
        index::{InMemoryIndex, NoteChunk, NoteMetadata},
        qdrant::QdrantError,
    };
    use reqwest::StatusCode;
    use serde_json::json;

    fn note(patient_id: &str, diagnosis: &str, treatment: &str, text: &str) -> NoteChunk {
        NoteChunk::new(
            text,
            Some(NoteMetadata {
                patient_id: patient_id.into(),
                name: format!("Patient {patient_id}"),
                age: "60".into(),
                diagnosis: diagnosis.into(),
                treatment: treatment.into(),
                followup: String::new(),
                full_note: Some(text.into()),
            }),
        )
    }

    async fn service() -> (NoteQueryService, Arc<InMemoryIndex>) {
        let index = Arc::new(
            InMemoryIndex::build(
                vec![
                    note("p1", "pneumonia", "amoxicillin", "Diagnosis: Pneumonia. Treatment: Amoxicillin."),
                    note("p2", "pneumonia", "amoxicillin", "Diagnosis: Pneumonia. Treatment: Amoxicillin."),
                    note("p3", "angina", "nitroglycerin", "Chest pain on exertion. Diagnosis: Angina. Treatment: Nitroglycerin."),
                    note("p4", "migraine", "sumatriptan", "Diagnosis: Migraine. Treatment: Sumatriptan."),
                ],
                Box::new(HashingEmbeddingClient::new(128)),
            )
            .await
            .expect("index"),
        );
        let service = NoteQueryService::new(index.clone(), SynonymTable::default());
        (service, index)
    }

    struct FailingIndex;

    #[async_trait]
    impl RetrievalIndex for FailingIndex {
        async fn scan_all(&self) -> Result<Vec<NoteChunk>, IndexError> {
            Err(IndexError::Qdrant(QdrantError::UnexpectedStatus {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "down".into(),
            }))
        }

        async fn similarity_search(
            &self,
            _query_text: &str,
            _k: usize,
        ) -> Result<Vec<NoteChunk>, IndexError> {
            Err(IndexError::EmptyEmbedding)
        }

        async fn exists(&self) -> Result<bool, IndexError> {
            Err(IndexError::EmptyEmbedding)
        }
    }

    fn failing_service() -> NoteQueryService {
        NoteQueryService::new(Arc::new(FailingIndex), SynonymTable::default())
    }

    #[tokio::test]
    async fn question_about_diagnosis_returns_matches() {
        let (service, _) = service().await;
        let reply = service
            .answer("Which patients have pneumonia?")
            .await
            .expect("reply");
        let value = serde_json::to_value(&reply).expect("json");
        assert_eq!(value["intent"], "which_patients");
        assert_eq!(value["diagnosis"], "pneumonia");
        assert_eq!(value["count"], 2);
    }

    #[tokio::test]
    async fn question_about_treatment_aggregates() {
        let (service, _) = service().await;
        let reply = service
            .answer("What is the most common treatment?")
            .await
            .expect("reply");
        assert_eq!(
            serde_json::to_value(&reply).expect("json"),
            json!({
                "intent": "most_common_treatment",
                "most_common_treatment": "amoxicillin",
                "frequency": 2,
                "total_analyzed": 4
            })
        );
    }

    #[tokio::test]
    async fn other_questions_fall_back_to_three_nearest_chunks() {
        let (service, index) = service().await;
        let reply = service
            .answer("Tell me about chest pain management")
            .await
            .expect("reply");
        let QueryReply::Answered(QueryOutcome::SemanticSearch { results }) = reply else {
            panic!("expected semantic search");
        };
        assert_eq!(results.len(), SEMANTIC_SEARCH_K);
        assert_eq!(index.search_count(), 1);
        assert_eq!(index.scan_count(), 0);
    }

    #[tokio::test]
    async fn extraction_miss_is_guidance_without_index_access() {
        let (service, index) = service().await;
        let reply = service.answer("Which patients have?").await.expect("reply");
        assert_eq!(
            serde_json::to_value(&reply).expect("json"),
            json!({ "error": EXTRACTION_MISS_MESSAGE })
        );
        assert_eq!(index.scan_count(), 0);
    }

    #[tokio::test]
    async fn blank_inputs_are_rejected_before_the_index() {
        let (service, index) = service().await;
        assert!(matches!(
            service.which_patients("  ").await,
            Err(QueryError::MissingDiagnosis)
        ));
        assert!(matches!(
            service.answer("").await,
            Err(QueryError::MissingQuestion)
        ));
        assert_eq!(index.scan_count(), 0);
        assert_eq!(index.search_count(), 0);
        assert_eq!(service.metrics_snapshot().failures, 2);
    }

    #[tokio::test]
    async fn index_failures_degrade_to_generic_replies() {
        let service = failing_service();
        for question in [
            "Which patients have pneumonia?",
            "most common treatment",
            "chest pain",
        ] {
            let reply = service.answer(question).await.expect("reply");
            assert_eq!(
                serde_json::to_value(&reply).expect("json"),
                json!({ "error": QUERY_FAILED_MESSAGE })
            );
        }
        assert!(matches!(
            service.which_patients("pneumonia").await,
            Err(QueryError::Index(_))
        ));
        assert!(service.list_patients().await.is_err());
        assert_eq!(service.metrics_snapshot().failures, 5);
    }

    #[tokio::test]
    async fn repeated_lookups_are_identical() {
        let (service, index) = service().await;
        let first = service.which_patients("headache").await.expect("first");
        let second = service.which_patients("headache").await.expect("second");
        assert_eq!(first.matches, second.matches);
        assert_eq!(first.count, second.count);
        assert_eq!(first.count, 1);
        assert_eq!(index.scan_count(), 2);
    }

    #[tokio::test]
    async fn patient_directory_and_health() {
        let (service, _) = service().await;
        let directory = service.list_patients().await.expect("directory");
        assert_eq!(directory.total_patients, 4);

        let health = service.health().await;
        assert!(health.index_reachable && health.collection_present);

        let failing = failing_service().health().await;
        assert!(!failing.index_reachable);
        assert_eq!(failing.error.as_deref(), Some("Index unreachable"));
    }
}
