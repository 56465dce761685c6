//! Pinecone vector index over the REST data plane.
//!
//! Pinecone API: https://docs.pinecone.io/reference/api/introduction

use crate::types::{IndexRecord, IndexStats, Metadata, QueryMatch, SOURCE_METADATA_KEY};
use crate::vector_index::VectorIndex;
use convrag_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-10";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upserts above this size are split into multiple requests.
const MAX_UPSERT_BATCH: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct DeleteBySourceRequest<'a> {
    filter: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeStatsResponse {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: std::collections::HashMap<String, NamespaceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

/// Pinecone index client bound to one data-plane host.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Create a client for a known data-plane host.
    pub fn new(
        host: impl AsRef<str>,
        api_key: impl Into<String>,
        namespace: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            client: build_client()?,
            host: normalize_host(host.as_ref()),
            api_key: api_key.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        })
    }

    /// Resolve the data-plane host of a named index through the control plane.
    pub async fn connect(
        name: &str,
        api_key: impl Into<String>,
        namespace: Option<String>,
        control_plane_url: &str,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        let client = build_client()?;
        let url = format!("{}/indexes/{}", control_plane_url.trim_end_matches('/'), name);

        tracing::debug!("Resolving Pinecone index host for '{}'", name);

        let response = client
            .get(&url)
            .header("Api-Key", &api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to reach Pinecone: {}", e)))?;

        let described: DescribeIndexResponse = read_json(response, AppError::Knowledge).await?;

        tracing::info!("Using Pinecone index '{}' at {}", name, described.host);

        Ok(Self {
            client,
            host: normalize_host(&described.host),
            api_key,
            namespace: namespace.filter(|ns| !ns.is_empty()),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> AppResult<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .post("/query")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to query Pinecone: {}", e)))?;

        let body: QueryResponse = read_json(response, AppError::Retrieval).await?;

        tracing::debug!("Pinecone returned {} matches", body.matches.len());

        Ok(body
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()> {
        for batch in records.chunks(MAX_UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch,
                namespace: self.namespace.as_deref(),
            };

            let response = self
                .post("/vectors/upsert")
                .json(&request)
                .send()
                .await
                .map_err(|e| AppError::Knowledge(format!("Failed to upsert to Pinecone: {}", e)))?;

            let _: serde_json::Value = read_json(response, AppError::Knowledge).await?;
        }

        Ok(())
    }

    async fn delete_source(&self, source: &str) -> AppResult<()> {
        let request = DeleteBySourceRequest {
            filter: serde_json::json!({ SOURCE_METADATA_KEY: { "$eq": source } }),
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .post("/vectors/delete")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to delete {} from Pinecone: {}", source, e)))?;

        let _: serde_json::Value = read_json(response, AppError::Knowledge).await?;
        Ok(())
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let response = self
            .post("/describe_index_stats")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to describe Pinecone index: {}", e)))?;

        let body: DescribeStatsResponse = read_json(response, AppError::Knowledge).await?;

        let vector_count = match self.namespace.as_deref() {
            Some(ns) => body.namespaces.get(ns).map(|s| s.vector_count).unwrap_or(0),
            None => body.total_vector_count,
        };

        Ok(IndexStats {
            backend: "pinecone".to_string(),
            vector_count,
            dimension: body.dimension,
            source_count: None,
            size_bytes: None,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        let request = DeleteRequest {
            delete_all: true,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .post("/vectors/delete")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to reset Pinecone index: {}", e)))?;

        let _: serde_json::Value = read_json(response, AppError::Knowledge).await?;

        tracing::info!("Cleared Pinecone namespace {:?}", self.namespace);
        Ok(())
    }
}

fn build_client() -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Check the status and decode a JSON body, mapping failures with `err`.
async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    err: fn(String) -> AppError,
) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(err(format!("Pinecone API error ({}): {}", status, error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| err(format!("Failed to parse Pinecone response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("docs-abc123.svc.us-east1.pinecone.io"),
            "https://docs-abc123.svc.us-east1.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn test_blank_namespace_is_default() {
        let index = PineconeIndex::new("idx.pinecone.io", "key", Some(String::new())).unwrap();
        assert!(index.namespace.is_none());
        assert_eq!(index.host(), "https://idx.pinecone.io");
        assert_eq!(index.backend_name(), "pinecone");
    }

    #[test]
    fn test_query_request_shape() {
        let vector = [0.1_f32, 0.2];
        let request = QueryRequest {
            vector: &vector,
            top_k: 10,
            include_metadata: true,
            include_values: false,
            namespace: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["topK"], 10);
        assert_eq!(body["includeMetadata"], true);
        assert!(body.get("namespace").is_none());
    }

    #[test]
    fn test_query_response_without_metadata() {
        let raw = serde_json::json!({
            "matches": [{"id": "a", "score": 0.82}, {"id": "b", "score": 0.4, "metadata": {"text": "Iqbal"}}],
            "namespace": ""
        });
        let parsed: QueryResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.matches.len(), 2);
        assert!(parsed.matches[0].metadata.is_none());
        assert_eq!(
            parsed.matches[1].metadata.as_ref().unwrap()["text"],
            "Iqbal"
        );
    }

    #[test]
    fn test_delete_request_shape() {
        let body = serde_json::to_value(DeleteRequest {
            delete_all: true,
            namespace: Some("history"),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"deleteAll": true, "namespace": "history"}));
    }

    #[test]
    fn test_delete_by_source_request_shape() {
        let body = serde_json::to_value(DeleteBySourceRequest {
            filter: serde_json::json!({ SOURCE_METADATA_KEY: { "$eq": "docs/a.pdf" } }),
            namespace: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"filter": {"source": {"$eq": "docs/a.pdf"}}}));
    }
}
