// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Comment, Post, Profile};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use postgres::PgEntityStore;

/// Persistence gateway for the three entity collections.
///
/// Lookups and upserts are bulk operations so one reconciliation pass costs a
/// fixed number of round-trips regardless of batch size.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_profiles(&self, keys: &[String]) -> Result<Vec<Profile>>;

    async fn find_posts(&self, keys: &[String]) -> Result<Vec<Post>>;

    async fn find_comments(&self, keys: &[String]) -> Result<Vec<Comment>>;

    /// Insert every entity whose key is not stored yet, leaving existing rows
    /// untouched. Profiles, posts and comments are written in that order and
    /// either all land or none do.
    async fn upsert_all(&self, profiles: &[Profile], posts: &[Post], comments: &[Comment]) -> Result<()>;

    /// Last block fully processed by `indexer_id`, if any.
    async fn last_processed_block(&self, indexer_id: &str) -> Result<Option<u64>>;

    async fn record_progress(&self, indexer_id: &str, block: u64) -> Result<()>;
}
