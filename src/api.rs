//! HTTP surface for the clinical notes query service.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /` – Capability listing of the endpoints below.
//! - `GET /which_patients?diagnosis=<term>` – Patients whose notes match a diagnosis term.
//! - `GET /most_common_treatment` – Most frequently prescribed treatment across patients.
//! - `POST /query` – Free-text question routed by intent (diagnosis, treatment, semantic search).
//! - `GET /debug/patients` – Every distinct patient with its stored diagnosis and treatment.
//! - `GET /metrics` – Query counters since startup.
//! - `GET /health` – Reachability of the retrieval index.
//!
//! Missing input is answered with `400`; index failures with `500` and a generic message. The
//! provider error itself is only logged.

use crate::metrics::MetricsSnapshot;
use crate::query::{
    DiagnosisLookup, IndexHealth, PatientDirectory, QueryApi, QueryError, QueryReply,
    TreatmentReport,
    types::{MISSING_DIAGNOSIS_MESSAGE, MISSING_QUESTION_MESSAGE},
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Generic message returned when the retrieval index fails on a direct endpoint.
pub const INDEX_FAILED_MESSAGE: &str = "Index lookup failed. Try again later.";

/// Build the HTTP router exposing the query API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QueryApi + 'static,
{
    Router::new()
        .route("/", get(get_catalog))
        .route("/which_patients", get(which_patients::<S>))
        .route("/most_common_treatment", get(most_common_treatment::<S>))
        .route("/query", post(query::<S>))
        .route("/debug/patients", get(debug_patients::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(get_health::<S>))
        .with_state(service)
}

/// Query string of `GET /which_patients`.
#[derive(Deserialize)]
struct WhichPatientsParams {
    /// Diagnosis term; required and non-blank.
    #[serde(default)]
    diagnosis: Option<String>,
}

/// Find patients whose stored notes match the supplied diagnosis term.
async fn which_patients<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<WhichPatientsParams>,
) -> Result<Json<DiagnosisLookup>, AppError>
where
    S: QueryApi,
{
    let diagnosis = params.diagnosis.unwrap_or_default();
    let lookup = service.which_patients(&diagnosis).await?;
    Ok(Json(lookup))
}

/// Report the most common treatment, or the no-treatments marker.
async fn most_common_treatment<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<TreatmentReport>, AppError>
where
    S: QueryApi,
{
    Ok(Json(service.most_common_treatment().await?))
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    /// Free-text question.
    #[serde(default)]
    q: String,
}

/// Classify a free-text question and answer it.
async fn query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryReply>, AppError>
where
    S: QueryApi,
{
    Ok(Json(service.answer(&request.q).await?))
}

/// List every distinct patient in the index.
async fn debug_patients<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<PatientDirectory>, AppError>
where
    S: QueryApi,
{
    Ok(Json(service.list_patients().await?))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: QueryApi,
{
    Json(service.metrics_snapshot())
}

async fn get_health<S>(State(service): State<Arc<S>>) -> (StatusCode, Json<IndexHealth>)
where
    S: QueryApi,
{
    let health = service.health().await;
    let status = if health.index_reachable && health.collection_present {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

/// Descriptor for a single endpoint in the capability listing.
#[derive(Serialize)]
struct EndpointDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

/// Response body for `GET /`.
#[derive(Serialize)]
struct CatalogResponse {
    message: &'static str,
    endpoints: Vec<EndpointDescriptor>,
}

/// Static capability listing for discovery by clients.
async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        message: "Clinical RAG API",
        endpoints: vec![
            EndpointDescriptor {
                name: "which_patients",
                method: "GET",
                path: "/which_patients",
                description: "Patients whose diagnosis or note mentions ?diagnosis=<term>.",
            },
            EndpointDescriptor {
                name: "most_common_treatment",
                method: "GET",
                path: "/most_common_treatment",
                description: "Most frequently prescribed treatment, counting each patient once.",
            },
            EndpointDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Answer a free-text question {\"q\": ...} by diagnosis lookup, treatment aggregation, or semantic search.",
            },
            EndpointDescriptor {
                name: "debug_patients",
                method: "GET",
                path: "/debug/patients",
                description: "Every distinct patient with stored diagnosis and treatment.",
            },
            EndpointDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Query counters since startup.",
            },
            EndpointDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Reachability of the note index.",
            },
        ],
    })
}

struct AppError(QueryError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            QueryError::MissingDiagnosis => (StatusCode::BAD_REQUEST, MISSING_DIAGNOSIS_MESSAGE),
            QueryError::MissingQuestion => (StatusCode::BAD_REQUEST, MISSING_QUESTION_MESSAGE),
            QueryError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, INDEX_FAILED_MESSAGE),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_catalog};
    use crate::index::IndexError;
    use crate::metrics::MetricsSnapshot;
    use crate::qdrant::QdrantError;
    use crate::query::{
        DiagnosisLookup, IndexHealth, PatientDirectory, QueryApi, QueryError, QueryReply,
        TreatmentReport,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use reqwest::StatusCode as UpstreamStatus;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn catalog_lists_every_query_endpoint() {
        let response = get_catalog().await;
        let paths: Vec<_> = response.0.endpoints.iter().map(|e| e.path).collect();
        for path in ["/which_patients", "/most_common_treatment", "/query", "/debug/patients"] {
            assert!(paths.contains(&path), "missing {path}");
        }
        assert_eq!(response.0.message, "Clinical RAG API");
    }

    #[tokio::test]
    async fn which_patients_passes_raw_term_through() {
        let service = Arc::new(StubQueryService::healthy());
        let app = create_router(service.clone());

        let (status, body) = send(app, Method::GET, "/which_patients?diagnosis=Headache", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diagnosis_searched"], "Headache");
        assert_eq!(service.recorded_terms().await, vec!["Headache".to_string()]);
    }

    #[tokio::test]
    async fn missing_diagnosis_maps_to_bad_request() {
        let service = Arc::new(StubQueryService::healthy());
        let app = create_router(service);

        let (status, body) = send(app, Method::GET, "/which_patients", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Provide ?diagnosis=..." }));
    }

    #[tokio::test]
    async fn index_failures_hide_provider_details() {
        let service = Arc::new(StubQueryService::failing());
        let app = create_router(service);

        let (status, body) = send(app, Method::GET, "/debug/patients", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": super::INDEX_FAILED_MESSAGE }));
        assert!(!body.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn query_route_accepts_json_body() {
        let service = Arc::new(StubQueryService::healthy());
        let app = create_router(service);

        let (status, body) = send(
            app,
            Method::POST,
            "/query",
            Some(json!({ "q": "What is the most common treatment?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "No treatments found");
    }

    #[tokio::test]
    async fn health_reports_unavailable_index() {
        let app = create_router(Arc::new(StubQueryService::failing()));
        let (status, body) = send(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["index_reachable"], false);
    }

    async fn send(
        app: axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(payload) => {
                builder = builder.header("content-type", "application/json");
                Body::from(payload.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    struct StubQueryService {
        terms: Mutex<Vec<String>>,
        fail: bool,
    }

    impl StubQueryService {
        fn healthy() -> Self {
            Self {
                terms: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                terms: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        async fn recorded_terms(&self) -> Vec<String> {
            self.terms.lock().await.clone()
        }

        fn check(&self) -> Result<(), QueryError> {
            if self.fail {
                Err(QueryError::Index(IndexError::Qdrant(
                    QdrantError::UnexpectedStatus {
                        status: UpstreamStatus::INTERNAL_SERVER_ERROR,
                        body: "disk full".into(),
                    },
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl QueryApi for StubQueryService {
        async fn which_patients(&self, diagnosis: &str) -> Result<DiagnosisLookup, QueryError> {
            if diagnosis.trim().is_empty() {
                return Err(QueryError::MissingDiagnosis);
            }
            self.check()?;
            self.terms.lock().await.push(diagnosis.to_string());
            Ok(DiagnosisLookup {
                diagnosis_searched: diagnosis.to_string(),
                matches: Vec::new(),
                count: 0,
            })
        }

        async fn most_common_treatment(&self) -> Result<TreatmentReport, QueryError> {
            self.check()?;
            Ok(TreatmentReport::no_treatments())
        }

        async fn answer(&self, _question: &str) -> Result<QueryReply, QueryError> {
            Ok(QueryReply::Answered(
                crate::query::QueryOutcome::MostCommonTreatment(TreatmentReport::no_treatments()),
            ))
        }

        async fn list_patients(&self) -> Result<PatientDirectory, QueryError> {
            self.check()?;
            Ok(PatientDirectory {
                total_patients: 0,
                patients: Vec::new(),
            })
        }

        async fn health(&self) -> IndexHealth {
            IndexHealth {
                index_reachable: !self.fail,
                collection_present: !self.fail,
                error: self.fail.then(|| "Index unreachable".to_string()),
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }
}
