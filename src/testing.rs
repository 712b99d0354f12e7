//! Test doubles for the HTTP seams.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::http::{HttpError, JsonTransport};

/// `JsonTransport` that answers from canned responses and records every call.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: HashMap<String, Value>,
    default: Option<Value>,
    fail: bool,
    fail_posts_after: Option<usize>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, path: &str, body: Value) -> Self {
        self.responses.insert(path.to_string(), body);
        self
    }

    /// Body returned for paths without a canned response.
    pub fn with_default(mut self, body: Value) -> Self {
        self.default = Some(body);
        self
    }

    /// Fail every request as if the remote kept answering 503.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Accept `n` POSTs, then fail the rest.
    pub fn fail_posts_after(mut self, n: usize) -> Self {
        self.fail_posts_after = Some(n);
        self
    }

    pub async fn gets(&self) -> Vec<String> {
        self.gets.lock().await.clone()
    }

    pub async fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().await.clone()
    }

    fn unavailable(path: &str) -> HttpError {
        HttpError::Status {
            url: path.to_string(),
            status: 503,
            body: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl JsonTransport for RecordingTransport {
    async fn get_json(&self, path: &str) -> Result<Option<Value>, HttpError> {
        self.gets.lock().await.push(path.to_string());
        if self.fail {
            return Err(Self::unavailable(path));
        }
        Ok(self
            .responses
            .get(path)
            .cloned()
            .or_else(|| self.default.clone()))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>, HttpError> {
        let mut posts = self.posts.lock().await;
        let accepted = posts.len();
        posts.push((path.to_string(), body.clone()));

        if self.fail || self.fail_posts_after.is_some_and(|n| accepted >= n) {
            return Err(Self::unavailable(path));
        }
        Ok(None)
    }
}
