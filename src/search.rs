// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Client for the Sepana search index.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{HttpConfig, SearchConfig};
use crate::http::{HttpClient, HttpClientOptions, HttpError, JsonTransport};

pub const INDEX_BATCH_SIZE: usize = 500;
pub const INSERT_PATH: &str = "/v1/engine/insert_data";
pub const API_KEY_HEADER: &str = "x-api-key";

pub struct SearchIndexClient {
    transport: Arc<dyn JsonTransport>,
    batch_size: usize,
}

impl SearchIndexClient {
    pub fn new(transport: Arc<dyn JsonTransport>) -> Self {
        Self {
            transport,
            batch_size: INDEX_BATCH_SIZE,
        }
    }

    /// Submit `documents` to `engine_id`, one batch request at a time.
    /// Returns the number of documents sent. The first failed batch aborts.
    pub async fn insert(&self, engine_id: &str, documents: &[Value]) -> Result<usize, HttpError> {
        let mut sent = 0;

        for (index, batch) in documents.chunks(self.batch_size).enumerate() {
            let body = json!({
                "engine_id": engine_id,
                "docs": batch,
            });
            self.transport.post_json(INSERT_PATH, &body).await?;

            sent += batch.len();
            debug!(engine_id, batch = index, size = batch.len(), "Inserted document batch");
        }

        if sent > 0 {
            info!(engine_id, documents = sent, "Indexed documents");
        }
        Ok(sent)
    }
}

/// HTTP transport for the search index, carrying the API key on every request.
pub fn search_transport(search: &SearchConfig, http: &HttpConfig) -> Result<HttpClient, HttpError> {
    HttpClient::new(HttpClientOptions {
        base_url: Some(search.base_url.clone()),
        headers: vec![(API_KEY_HEADER.to_string(), search.api_key.clone())],
        retry_attempts: http.retry_attempts,
        timeout: http.timeout,
        ..HttpClientOptions::default()
    })
}
