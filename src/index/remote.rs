//! Client for the hosted serverless vector index.
//!
//! Speaks the provider's records API: records are upserted as
//! `{id, text, ...metadata}` and the provider computes embeddings
//! server-side, for writes and for queries alike. Trading away control of
//! the embedding model keeps this client to plain JSON over HTTPS.
//!
//! [`RemoteIndex::connect`] provisions the index on first use
//! (create-if-absent with a fixed dimension, cosine metric, and
//! serverless deployment parameters). Index creation is eventually
//! consistent, so the create path waits a fixed settle period before the
//! index is treated as queryable; a warm lookup skips the wait.
//!
//! No retries live here. Transport and quota errors surface as
//! [`IndexError`] and retry policy, if any, belongs to callers.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::config::IndexConfig;
use crate::models::{DocumentRecord, RetrievedChunk};

use super::{IndexError, VectorIndex};

pub struct RemoteIndex {
    client: reqwest::Client,
    api_key: String,
    /// Data-plane base URL, e.g. `https://lesson-docs-abc123.svc.aped-4627.pinecone.io`.
    host: String,
    namespace: String,
}

impl RemoteIndex {
    /// Connect to the configured index, creating it if absent.
    pub async fn connect(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let host = match &config.host {
            Some(host) if !host.is_empty() => host.clone(),
            _ => ensure_index(&client, &api_key, config).await?,
        };
        let host = if host.starts_with("http") {
            host
        } else {
            format!("https://{}", host)
        };

        Ok(Self {
            client,
            api_key,
            host,
            namespace: config.namespace.clone(),
        })
    }

    fn namespace_url(&self, operation: &str) -> String {
        format!(
            "{}/records/namespaces/{}/{}",
            self.host, self.namespace, operation
        )
    }
}

/// Look the index up on the control plane; create it and wait out the
/// settle period when missing. Returns the index's data-plane host.
async fn ensure_index(
    client: &reqwest::Client,
    api_key: &str,
    config: &IndexConfig,
) -> Result<String> {
    let describe_url = format!("{}/indexes/{}", config.api_base, config.name);

    let resp = client
        .get(&describe_url)
        .header("Api-Key", api_key)
        .send()
        .await
        .context("index lookup failed")?;

    if resp.status().is_success() {
        let body: serde_json::Value = resp.json().await?;
        return host_from_description(&body);
    }

    if resp.status() != reqwest::StatusCode::NOT_FOUND {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("index lookup error {}: {}", status, body);
    }

    tracing::info!(index = %config.name, "creating vector index");
    let create = client
        .post(format!("{}/indexes", config.api_base))
        .header("Api-Key", api_key)
        .json(&json!({
            "name": config.name,
            "dimension": config.dimension,
            "metric": config.metric,
            "spec": {
                "serverless": {
                    "cloud": config.cloud,
                    "region": config.region,
                }
            }
        }))
        .send()
        .await
        .context("index creation failed")?;

    if !create.status().is_success() {
        let status = create.status();
        let body = create.text().await.unwrap_or_default();
        bail!("index creation error {}: {}", status, body);
    }

    // Creation is eventually consistent; give the index time to come up.
    tokio::time::sleep(Duration::from_secs(config.settle_secs)).await;

    let described: serde_json::Value = client
        .get(&describe_url)
        .header("Api-Key", api_key)
        .send()
        .await?
        .json()
        .await?;
    host_from_description(&described)
}

fn host_from_description(body: &serde_json::Value) -> Result<String> {
    body.get("host")
        .and_then(|h| h.as_str())
        .map(|h| h.to_string())
        .ok_or_else(|| anyhow::anyhow!("index description missing host"))
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    async fn upsert(&self, records: &[DocumentRecord]) -> Result<(), IndexError> {
        // The records endpoint takes newline-delimited JSON, one record per line.
        let mut body = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| IndexError::Upsert(e.to_string()))?;
            body.push_str(&line);
            body.push('\n');
        }

        let resp = self
            .client
            .post(self.namespace_url("upsert"))
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| IndexError::Upsert(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Upsert(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn delete_by_resource(&self, resource_id: i64) -> Result<(), IndexError> {
        let resp = self
            .client
            .post(self.namespace_url("delete"))
            .header("Api-Key", &self.api_key)
            .json(&json!({
                "filter": { "resourceId": { "$eq": resource_id } }
            }))
            .send()
            .await
            .map_err(|e| IndexError::Delete(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Delete(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        lesson_id: Option<i64>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        let mut filter = serde_json::Map::new();
        if let Some(id) = lesson_id {
            filter.insert("lessonId".to_string(), json!({ "$eq": id }));
        }

        let resp = self
            .client
            .post(self.namespace_url("search"))
            .header("Api-Key", &self.api_key)
            .json(&json!({
                "query": {
                    "topK": top_k,
                    "inputs": { "text": query },
                    "filter": filter,
                },
                "fields": [
                    "text", "fileName", "fileType", "chunkIndex",
                    "resourceId", "lessonId", "title", "author",
                ],
            }))
            .send()
            .await
            .map_err(|e| IndexError::Search(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Search(format!("{}: {}", status, body)));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IndexError::Search(e.to_string()))?;
        Ok(parse_hits(&body))
    }
}

/// Shape provider hits (`{_id, _score, fields}`) into [`RetrievedChunk`]s.
/// Missing fields fall back to defaults rather than failing the search.
fn parse_hits(body: &serde_json::Value) -> Vec<RetrievedChunk> {
    let hits = body
        .pointer("/result/hits")
        .and_then(|h| h.as_array())
        .map(|h| h.as_slice())
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let fields = hit.get("fields").cloned().unwrap_or(json!({}));
            let text_field = |name: &str| {
                fields
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let int_field = |name: &str| fields.get(name).and_then(|v| v.as_i64()).unwrap_or(0);

            RetrievedChunk {
                id: hit
                    .get("_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: hit.get("_score").and_then(|v| v.as_f64()).unwrap_or(0.0),
                text: text_field("text"),
                file_name: text_field("fileName"),
                file_type: text_field("fileType"),
                chunk_index: int_field("chunkIndex") as usize,
                resource_id: int_field("resourceId"),
                lesson_id: int_field("lessonId"),
                title: text_field("title"),
                author: text_field("author"),
            }
        })
        .collect()
}
