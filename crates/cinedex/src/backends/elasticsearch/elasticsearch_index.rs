use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::ElasticsearchIndexConfig;
use crate::backends::SearchIndex;
use crate::retry::RetryPolicy;

/// 📡 The real cluster, reached through one pooled `reqwest::Client`.
#[derive(Debug)]
pub(crate) struct ElasticsearchIndex {
    client: reqwest::Client,
    config: ElasticsearchIndexConfig,
}

impl ElasticsearchIndex {
    /// 🚀 Build the client, make sure somebody is home, and check whether the index exists.
    ///
    /// A cluster that never answers (after the retry policy gives up) is fatal. A missing
    /// index is only a warning: `_bulk` creates it on first write, with dynamic mappings,
    /// which is probably not what you wanted but is at least not an outage.
    pub(crate) async fn new(
        config: ElasticsearchIndexConfig,
        index_name: &str,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably the TLS stack. Either way: tragic.")?;

        let mut index = Self { client, config };

        retry
            .run("ping the search cluster", &mut index, |index| {
                Box::pin(async move { index.ping().await })
            })
            .await
            .context(format!(
                "💀 Elasticsearch at '{}' never answered. Check the url, the credentials, and whether the cluster is actually running.",
                index.config.url
            ))?;

        index.check_index_exists(index_name).await;
        Ok(index)
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// 🔑 API key beats basic auth. No credentials at all is also allowed (local dev clusters).
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.base_url()))
            .send()
            .await
            .context("💀 Knocked on the cluster's front door. Nobody came.")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "💀 The cluster answered the ping with '{}'. That's not a hello.",
                status
            );
        }
        debug!("📡 Cluster at {} says hi ({})", self.base_url(), status);
        Ok(())
    }

    async fn check_index_exists(&self, index_name: &str) {
        let index_url = format!("{}/{}", self.base_url(), index_name);
        match self.authorize(self.client.head(&index_url)).send().await {
            Ok(response) if response.status().is_success() => {
                info!("✅ Index '{}' exists and is accepting visitors", index_name);
            }
            Ok(response) => {
                warn!(
                    "⚠️ Index '{}' answered {}. The first bulk write will create it with dynamic mappings. Create it with the real mapping first if you care about search quality.",
                    index_name,
                    response.status()
                );
            }
            Err(err) => {
                warn!(
                    "⚠️ Could not check whether index '{}' exists: {:#}. Carrying on; the bulk writes will tell us soon enough.",
                    index_name, err
                );
            }
        }
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn bulk(&self, payload: String) -> Result<String> {
        let bulk_url = format!("{}/_bulk", self.base_url());
        debug!("📡 Sending {} bytes to {}", payload.len(), bulk_url);

        let request = self
            .client
            .post(&bulk_url)
            .header("Content-Type", "application/x-ndjson");
        let response = self
            .authorize(request)
            .body(payload)
            .send()
            .await
            .context("💀 The bulk request never made it to Elasticsearch. Check connectivity and timeouts.")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("💀 Elasticsearch replied, but the body got lost on the way back.")?;
        if !status.is_success() {
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch said '{}'. The body of the response read: '{}'.",
                status,
                body
            );
        }
        trace!("🚀 Bulk request landed ({} response bytes)", body.len());
        Ok(body)
    }
}
