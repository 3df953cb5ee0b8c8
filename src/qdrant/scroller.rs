//! Streaming helpers for iterating Qdrant scroll endpoints without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Value, json};

use super::client::{QdrantService, stringify_point_id};
use super::types::{QdrantError, ScrollResponse, StoredPoint};

const DEFAULT_SCROLL_LIMIT: usize = 512;

/// Stream every point of a collection with its full payload, following `next_page_offset`
/// until Qdrant reports no further pages.
///
/// Points without a payload are yielded too; callers decide how to treat them.
pub fn stream_points<'a>(
    service: &'a QdrantService,
    collection: &'a str,
) -> impl Stream<Item = Result<StoredPoint, QdrantError>> + 'a {
    try_stream! {
        let mut offset: Option<Value> = None;

        loop {
            let body = json!({
                "with_payload": true,
                "with_vector": false,
                "limit": DEFAULT_SCROLL_LIMIT,
                "offset": offset.clone().unwrap_or(Value::Null),
            });

            let response = service
                .request(Method::POST, &format!("collections/{collection}/points/scroll"))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let ScrollResponse { result } = response.json().await?;
                for point in result.points {
                    yield StoredPoint {
                        id: point.id.map(stringify_point_id).unwrap_or_default(),
                        payload: point.payload,
                    };
                }

                match result.next_page_offset {
                    Some(Value::Null) | None => break,
                    Some(next) => offset = Some(next),
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = collection, status = %status, "Failed to scroll points");
                Err(QdrantError::UnexpectedStatus { status, body })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, stream::StreamExt};
    use httpmock::{Method::POST, MockServer};

    fn service_for(server: &MockServer) -> QdrantService {
        QdrantService::with_endpoint(&server.base_url(), None).expect("client")
    }

    #[tokio::test]
    async fn stream_points_collects_multiple_pages() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);

        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/notes/points/scroll")
                    .body_contains("\"offset\":null");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "a", "payload": { "page_content": "first" } },
                            { "id": "b" }
                        ],
                        "next_page_offset": "c"
                    }
                }));
            })
            .await;

        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/notes/points/scroll")
                    .body_contains("\"offset\":\"c\"");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": "c", "payload": { "page_content": "third" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let stream = stream_points(&service, "notes");
        pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.expect("point"));
        }

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "a");
        assert!(items[1].payload.is_none());
        assert_eq!(
            items[2]
                .payload
                .as_ref()
                .and_then(|payload| payload.get("page_content"))
                .and_then(Value::as_str),
            Some("third")
        );
    }

    #[tokio::test]
    async fn stream_points_surfaces_error_status() {
        let server = MockServer::start_async().await;
        let service = service_for(&server);
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/notes/points/scroll");
                then.status(500).body("storage unavailable");
            })
            .await;

        let stream = stream_points(&service, "notes");
        pin_mut!(stream);
        let first = stream.next().await.expect("one item");
        assert!(matches!(first, Err(QdrantError::UnexpectedStatus { .. })));
    }
}
