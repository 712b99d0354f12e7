// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Resolves publication content URIs to metadata documents.

use std::sync::Arc;

use futures::future::try_join_all;
use reqwest::Url;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{HttpConfig, IpfsConfig};
use crate::http::{HttpClient, HttpClientOptions, HttpError, JsonTransport};
use crate::models::ContentRef;

/// Items fetched concurrently; sub-batches run one after another.
pub const METADATA_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Unexpected url \"{0}\"")]
    UnexpectedUri(String),

    #[error("content gateway request failed: {0}")]
    Gateway(#[from] HttpError),
}

/// Where a content URI is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriTarget {
    /// Path on the IPFS content gateway
    Gateway(String),
    /// Arbitrary absolute URL
    Direct(String),
}

/// Map a content URI to its fetch target. Empty URIs have no target.
pub fn resolve_uri(uri: &str) -> Result<Option<UriTarget>, MetadataError> {
    if uri.is_empty() {
        return Ok(None);
    }

    if let Some(cid) = uri.strip_prefix("ipfs://") {
        if cid.is_empty() {
            return Err(MetadataError::UnexpectedUri(uri.to_string()));
        }
        return Ok(Some(UriTarget::Gateway(format!("ipfs/{cid}"))));
    }

    if uri.starts_with("/ipfs") {
        return Ok(Some(UriTarget::Gateway(uri.to_string())));
    }

    if uri.starts_with("http://") || uri.starts_with("https://") {
        if uri.contains("ipfs/") {
            let parsed =
                Url::parse(uri).map_err(|_| MetadataError::UnexpectedUri(uri.to_string()))?;
            return Ok(Some(UriTarget::Gateway(parsed.path().to_string())));
        }
        return Ok(Some(UriTarget::Direct(uri.to_string())));
    }

    if uri.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(Some(UriTarget::Gateway(format!("ipfs/{uri}"))));
    }

    Err(MetadataError::UnexpectedUri(uri.to_string()))
}

/// Prefix a metadata document with the id of the entity it belongs to.
/// Documents that are not JSON objects cannot be indexed and are dropped.
pub fn tag_document(id: &str, metadata: Value) -> Option<Value> {
    match metadata {
        Value::Object(fields) => {
            let mut doc = Map::with_capacity(fields.len() + 1);
            doc.insert("_id".to_string(), Value::String(id.to_string()));
            for (key, value) in fields {
                if key != "_id" {
                    doc.insert(key, value);
                }
            }
            Some(Value::Object(doc))
        }
        other => {
            warn!(id, kind = json_kind(&other), "Metadata is not a JSON object, skipping");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct MetadataFetcher {
    gateway: Arc<dyn JsonTransport>,
    web: Arc<dyn JsonTransport>,
    batch_size: usize,
}

impl MetadataFetcher {
    pub fn new(gateway: Arc<dyn JsonTransport>, web: Arc<dyn JsonTransport>) -> Self {
        Self {
            gateway,
            web,
            batch_size: METADATA_BATCH_SIZE,
        }
    }

    /// Fetch metadata for every item, aligned with the input. Items without
    /// content, and direct-URL fetches that fail, yield `None`. Gateway
    /// failures and malformed URIs abort the whole operation.
    pub async fn fetch_metadata(&self, items: &[ContentRef]) -> Result<Vec<Option<Value>>, MetadataError> {
        let mut results = Vec::with_capacity(items.len());

        for chunk in items.chunks(self.batch_size) {
            let fetched = try_join_all(chunk.iter().map(|item| self.fetch_one(item))).await?;
            results.extend(fetched);
        }

        Ok(results)
    }

    async fn fetch_one(&self, item: &ContentRef) -> Result<Option<Value>, MetadataError> {
        let Some(uri) = item.content_uri.as_deref() else {
            return Ok(None);
        };

        let metadata = match resolve_uri(uri)? {
            None => None,
            Some(UriTarget::Gateway(path)) => self.gateway.get_json(&path).await?,
            Some(UriTarget::Direct(url)) => match self.web.get_json(&url).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(id = %item.id, url = %url, error = %e, "Direct metadata fetch failed");
                    None
                }
            },
        };

        Ok(metadata.and_then(|m| tag_document(&item.id, m)))
    }
}

/// Client for the IPFS content gateway.
pub fn gateway_transport(ipfs: &IpfsConfig, http: &HttpConfig) -> Result<HttpClient, HttpError> {
    HttpClient::new(HttpClientOptions {
        base_url: Some(ipfs.gateway_url.clone()),
        retry_attempts: http.retry_attempts,
        timeout: http.timeout,
        ..HttpClientOptions::default()
    })
}

/// Client for arbitrary absolute metadata URLs.
pub fn web_transport(http: &HttpConfig) -> Result<HttpClient, HttpError> {
    HttpClient::new(HttpClientOptions {
        retry_attempts: http.retry_attempts,
        timeout: http.timeout,
        ..HttpClientOptions::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;
    use serde_json::json;

    fn item(id: &str, uri: Option<&str>) -> ContentRef {
        ContentRef {
            id: id.to_string(),
            content_uri: uri.map(str::to_string),
        }
    }

    #[test]
    fn dispatches_uri_shapes() {
        assert_eq!(
            resolve_uri("ipfs://bafy123").unwrap(),
            Some(UriTarget::Gateway("ipfs/bafy123".to_string()))
        );
        assert_eq!(
            resolve_uri("/ipfs/bafy123").unwrap(),
            Some(UriTarget::Gateway("/ipfs/bafy123".to_string()))
        );
        assert_eq!(
            resolve_uri("https://x.example/ipfs/bafy123").unwrap(),
            Some(UriTarget::Gateway("/ipfs/bafy123".to_string()))
        );
        assert_eq!(
            resolve_uri("https://other.example/meta.json").unwrap(),
            Some(UriTarget::Direct("https://other.example/meta.json".to_string()))
        );
        assert_eq!(
            resolve_uri("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG").unwrap(),
            Some(UriTarget::Gateway(
                "ipfs/QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".to_string()
            ))
        );
        assert_eq!(resolve_uri("").unwrap(), None);
    }

    #[test]
    fn unexpected_shapes_are_errors() {
        for uri in ["ftp://x", "ipfs://", "ar://abc", "not a uri"] {
            assert!(
                matches!(resolve_uri(uri), Err(MetadataError::UnexpectedUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[test]
    fn tagging_puts_entity_id_first_and_wins() {
        let doc = tag_document("1-2", json!({"content": "gm", "_id": "spoofed"})).unwrap();
        assert_eq!(doc, json!({"_id": "1-2", "content": "gm"}));
        assert_eq!(doc.as_object().unwrap().keys().next().unwrap(), "_id");
        assert_eq!(tag_document("1-2", json!(["not", "an", "object"])), None);
    }

    #[tokio::test]
    async fn results_stay_aligned_with_input() {
        let gateway = Arc::new(
            RecordingTransport::new()
                .with_response("ipfs/bafyA", json!({"content": "a"}))
                .with_response("/ipfs/bafyB", json!({"content": "b"})),
        );
        let web = Arc::new(RecordingTransport::new().failing());
        let fetcher = MetadataFetcher::new(gateway.clone(), web.clone());

        let results = fetcher
            .fetch_metadata(&[
                item("1", Some("ipfs://bafyA")),
                item("2", None),
                item("3", Some("")),
                item("4", Some("https://cdn.example/ipfs/bafyB")),
                item("5", Some("https://other.example/meta.json")),
            ])
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                Some(json!({"_id": "1", "content": "a"})),
                None,
                None,
                Some(json!({"_id": "4", "content": "b"})),
                None,
            ]
        );
        assert_eq!(web.gets().await, vec!["https://other.example/meta.json"]);
        let mut gateway_paths = gateway.gets().await;
        gateway_paths.sort();
        assert_eq!(gateway_paths, vec!["/ipfs/bafyB", "ipfs/bafyA"]);
    }

    #[tokio::test]
    async fn empty_uri_makes_no_request() {
        let gateway = Arc::new(RecordingTransport::new());
        let web = Arc::new(RecordingTransport::new());
        let fetcher = MetadataFetcher::new(gateway.clone(), web.clone());

        let results = fetcher.fetch_metadata(&[item("1", Some(""))]).await.unwrap();

        assert_eq!(results, vec![None]);
        assert!(gateway.gets().await.is_empty());
        assert!(web.gets().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_uri_aborts_the_pass() {
        let gateway = Arc::new(RecordingTransport::new());
        let fetcher = MetadataFetcher::new(gateway, Arc::new(RecordingTransport::new()));

        let err = fetcher
            .fetch_metadata(&[item("1", Some("ftp://x"))])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnexpectedUri(_)));
    }

    #[tokio::test]
    async fn gateway_failure_is_fatal() {
        let gateway = Arc::new(RecordingTransport::new().failing());
        let fetcher = MetadataFetcher::new(gateway, Arc::new(RecordingTransport::new()));

        let err = fetcher
            .fetch_metadata(&[item("1", Some("ipfs://bafyA"))])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Gateway(_)));
    }

    #[tokio::test]
    async fn every_sub_batch_is_fetched() {
        let gateway = Arc::new(RecordingTransport::new().with_default(json!({"v": 1})));
        let fetcher = MetadataFetcher::new(gateway.clone(), Arc::new(RecordingTransport::new()));

        let items: Vec<ContentRef> = (0..250)
            .map(|i| item(&i.to_string(), Some(&format!("ipfs://cid{i}"))))
            .collect();
        let results = fetcher.fetch_metadata(&items).await.unwrap();

        assert_eq!(results.len(), 250);
        assert!(results.iter().all(Option::is_some));
        assert_eq!(results[249].as_ref().unwrap()["_id"], json!("249"));
        assert_eq!(gateway.gets().await.len(), 250);
    }
}
