use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of request served by the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Diagnosis lookup, direct or classified.
    DiagnosisLookup,
    /// Treatment aggregation, direct or classified.
    TreatmentAggregation,
    /// Similarity search fallback.
    SemanticSearch,
    /// Patient directory listing.
    PatientListing,
}

/// Thread-safe counters describing query activity.
#[derive(Default)]
pub struct QueryMetrics {
    diagnosis_lookups: AtomicU64,
    treatment_aggregations: AtomicU64,
    semantic_searches: AtomicU64,
    patient_listings: AtomicU64,
    failures: AtomicU64,
}

impl QueryMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a served request of the given kind.
    pub fn record(&self, kind: QueryKind) {
        let counter = match kind {
            QueryKind::DiagnosisLookup => &self.diagnosis_lookups,
            QueryKind::TreatmentAggregation => &self.treatment_aggregations,
            QueryKind::SemanticSearch => &self.semantic_searches,
            QueryKind::PatientListing => &self.patient_listings,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in an error response.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            diagnosis_lookups: self.diagnosis_lookups.load(Ordering::Relaxed),
            treatment_aggregations: self.treatment_aggregations.load(Ordering::Relaxed),
            semantic_searches: self.semantic_searches.load(Ordering::Relaxed),
            patient_listings: self.patient_listings.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of query counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Diagnosis lookups served since startup.
    pub diagnosis_lookups: u64,
    /// Treatment aggregations served since startup.
    pub treatment_aggregations: u64,
    /// Similarity searches served since startup.
    pub semantic_searches: u64,
    /// Patient listings served since startup.
    pub patient_listings: u64,
    /// Requests answered with an error.
    pub failures: u64,
}
