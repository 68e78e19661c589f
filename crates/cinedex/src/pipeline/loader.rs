use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::Stage;
use crate::app_config::BulkItemErrorPolicy;
use crate::backends::{IndexBackend, SearchIndex};
use crate::common::Document;
use crate::composers::{Composer, NdjsonComposer};
use crate::retry::RetryPolicy;

/// 📡 Last stage: compose one `_bulk` request, send it (with retries), read the verdict.
#[derive(Debug)]
pub(crate) struct BulkLoader {
    index: Arc<IndexBackend>,
    index_name: String,
    retry: RetryPolicy,
    item_errors: BulkItemErrorPolicy,
    composer: NdjsonComposer,
}

impl BulkLoader {
    pub(crate) fn new(
        index: Arc<IndexBackend>,
        index_name: String,
        retry: RetryPolicy,
        item_errors: BulkItemErrorPolicy,
    ) -> Self {
        Self {
            index,
            index_name,
            retry,
            item_errors,
            composer: NdjsonComposer,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    took: Option<u64>,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkItem {
    fn failed(&self) -> bool {
        self.error.is_some() || !(200..300).contains(&self.status)
    }

    fn reason(&self) -> String {
        match self.error {
            Some(ref error) => error
                .get("reason")
                .and_then(|reason| reason.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            None => format!("status {}", self.status),
        }
    }
}

/// 📜 Parsing lives inside the retried operation: a body that isn't a bulk response is a
/// broken request (a proxy error page, a truncated read), not a verdict on our documents.
fn parse_response(body: &str) -> Result<BulkResponse> {
    serde_json::from_str(body).context(format!(
        "💀 The bulk response is not the JSON we expected. First bytes: '{}'",
        body.chars().take(200).collect::<String>()
    ))
}

#[async_trait]
impl Stage for BulkLoader {
    type Input = Vec<Document>;

    async fn send(&mut self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let payload = self.composer.compose(&documents, &self.index_name)?;
        let retry = self.retry;
        let response = retry
            .run(
                &format!("bulk load {} documents into '{}'", documents.len(), self.index_name),
                &mut self.index,
                |index| {
                    let payload = payload.clone();
                    Box::pin(async move {
                        let body = index.bulk(payload).await?;
                        parse_response(&body)
                    })
                },
            )
            .await?;

        let failures: Vec<&BulkItem> = response
            .items
            .iter()
            .flat_map(|item| item.values())
            .filter(|item| item.failed())
            .collect();

        for item in &failures {
            error!(
                "💀 Document '{}' was rejected by the index ({}): {}",
                item.id.as_deref().unwrap_or("<no id>"),
                item.status,
                item.reason()
            );
        }
        if response.errors && failures.is_empty() {
            warn!("⚠️ Bulk response says errors=true but no item admits to it. Suspicious, but moving on.");
        }

        if !failures.is_empty() && self.item_errors == BulkItemErrorPolicy::Fail {
            anyhow::bail!(
                "💀 {} of {} documents were rejected by the index. First complaint: {}",
                failures.len(),
                documents.len(),
                failures[0].reason()
            );
        }

        let loaded = documents.len().saturating_sub(failures.len());
        debug!(
            "📡 Loaded {}/{} documents into '{}' (took {} ms)",
            loaded,
            documents.len(),
            self.index_name,
            response.took.unwrap_or_default()
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::elasticsearch::ElasticsearchIndex;
    use crate::backends::{ElasticsearchIndexConfig, in_mem::InMemoryIndex};
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn documents(count: u128) -> Vec<Document> {
        (1..=count)
            .map(|n| Document {
                id: Uuid::from_u128(n),
                title: format!("Film {}", n),
                description: None,
                imdb_rating: None,
                genre: vec![],
                director: vec![],
                actors: vec![],
                actors_names: vec![],
                writers: vec![],
                writers_names: vec![],
            })
            .collect()
    }

    fn impatient() -> RetryPolicy {
        RetryPolicy::new(10, Duration::from_millis(1), 2, None)
    }

    fn loader_over(index: &InMemoryIndex, policy: BulkItemErrorPolicy) -> BulkLoader {
        BulkLoader::new(
            Arc::new(IndexBackend::InMemory(index.clone())),
            "movies".to_string(),
            impatient(),
            policy,
        )
    }

    #[tokio::test]
    async fn the_one_where_nothing_to_load_means_no_request() -> Result<()> {
        let index = InMemoryIndex::new();
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);
        assert_eq!(loader.send(Vec::new()).await?, 0);
        assert_eq!(index.attempts().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_loading_twice_is_still_one_document_each() -> Result<()> {
        let index = InMemoryIndex::new();
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);
        assert_eq!(loader.send(documents(3)).await?, 3);
        assert_eq!(loader.send(documents(3)).await?, 3);
        assert_eq!(index.documents("movies").await.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nine_failures_are_forgiven_on_the_tenth_try() -> Result<()> {
        let index = InMemoryIndex::new();
        index.fail_next(9).await;
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);

        assert_eq!(loader.send(documents(2)).await?, 2);
        assert_eq!(index.attempts().await, 10);
        assert_eq!(index.documents("movies").await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_ten_failures_are_one_too_many() {
        let index = InMemoryIndex::new();
        index.fail_next(10).await;
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);

        assert!(loader.send(documents(2)).await.is_err());
        assert_eq!(index.attempts().await, 10);
    }

    #[tokio::test]
    async fn the_one_where_a_garbage_body_is_retried() -> Result<()> {
        let index = InMemoryIndex::new();
        index.respond_with_garbage_next(2).await;
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);

        assert_eq!(loader.send(documents(1)).await?, 1);
        assert_eq!(index.attempts().await, 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_one_bad_apple_is_logged_and_forgotten() -> Result<()> {
        let index = InMemoryIndex::new();
        index.reject_id(&Uuid::from_u128(4).to_string()).await;
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Log);

        assert_eq!(loader.send(documents(10)).await?, 9);
        assert_eq!(index.attempts().await, 1, "item errors are not retried");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_one_bad_apple_spoils_the_batch_under_the_fail_policy() -> Result<()> {
        let index = InMemoryIndex::new();
        index.reject_id(&Uuid::from_u128(4).to_string()).await;
        let mut loader = loader_over(&index, BulkItemErrorPolicy::Fail);

        let err = loader
            .send(documents(10))
            .await
            .expect_err("💀 the fail policy must fail");
        assert!(format!("{:#}", err).contains("1 of 10"));
        assert_eq!(index.attempts().await, 1, "item errors are not retried");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_real_client_rides_out_nine_503s() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(9)
            .expect(9)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"took":3,"errors":false,"items":[{"index":{"_id":"x","status":201}}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let es = ElasticsearchIndex::new(
            ElasticsearchIndexConfig {
                url: server.uri(),
                username: None,
                password: None,
                api_key: None,
                request_timeout_secs: 5,
            },
            "movies",
            impatient(),
        )
        .await?;
        let mut loader = BulkLoader::new(
            Arc::new(IndexBackend::Elasticsearch(es)),
            "movies".to_string(),
            impatient(),
            BulkItemErrorPolicy::Log,
        );

        assert_eq!(loader.send(documents(1)).await?, 1);
        Ok(())
    }
}
