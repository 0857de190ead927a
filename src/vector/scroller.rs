//! Streaming helper for paging through a collection with the scroll API.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Value, json};

use super::client::QdrantService;
use super::types::{ScrollResponse, StoredChunk, VectorError};

const SCROLL_PAGE_SIZE: usize = 100;

/// Stream every stored chunk of `collection`, page by page, in Qdrant's order.
///
/// Points without a `text` or `chunkIndex` payload are skipped.
pub fn stream_chunks<'a>(
    service: &'a QdrantService,
    collection: &'a str,
) -> impl Stream<Item = Result<StoredChunk, VectorError>> + 'a {
    try_stream! {
        let mut offset = Value::Null;

        loop {
            let body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "offset": offset,
                "with_payload": true,
                "with_vector": false,
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
                    let Some(payload) = point.payload else { continue };
                    let text = payload.get("text").and_then(Value::as_str);
                    let index = payload.get("chunkIndex").and_then(Value::as_u64);
                    match (text, index) {
                        (Some(text), Some(index)) => {
                            yield StoredChunk {
                                index: index as usize,
                                text: text.to_string(),
                            };
                        }
                        _ => {
                            tracing::debug!(collection, "Skipping point without chunk payload");
                        }
                    }
                }

                match result.next_page_offset {
                    Some(next) if !next.is_null() => offset = next,
                    _ => break,
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection, status = %status, "Failed to scroll collection");
                Err(VectorError::UnexpectedStatus { status, body })?;
            }
        }
    }
}
