// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use tracing::debug;

use super::EntityStore;
use crate::db::Database;
use crate::models::indexer::{IndexerProgress, NewIndexerProgress};
use crate::models::{Comment, Post, Profile};
use crate::schema;

/// Rows per INSERT statement; keeps bind parameters well under Postgres' 65535 limit.
const INSERT_CHUNK: usize = 1000;

/// `EntityStore` backed by the Postgres pool.
pub struct PgEntityStore {
    db: Arc<Database>,
}

impl PgEntityStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn find_profiles(&self, keys: &[String]) -> Result<Vec<Profile>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.get_connection().await?;
        let rows = schema::profiles::table
            .filter(schema::profiles::id.eq_any(keys))
            .select(Profile::as_select())
            .load(&mut conn)
            .await
            .context("Failed to look up profiles")?;
        Ok(rows)
    }

    async fn find_posts(&self, keys: &[String]) -> Result<Vec<Post>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.get_connection().await?;
        let rows = schema::posts::table
            .filter(schema::posts::id.eq_any(keys))
            .select(Post::as_select())
            .load(&mut conn)
            .await
            .context("Failed to look up posts")?;
        Ok(rows)
    }

    async fn find_comments(&self, keys: &[String]) -> Result<Vec<Comment>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.db.get_connection().await?;
        let rows = schema::comments::table
            .filter(schema::comments::id.eq_any(keys))
            .select(Comment::as_select())
            .load(&mut conn)
            .await
            .context("Failed to look up comments")?;
        Ok(rows)
    }

    async fn upsert_all(&self, profiles: &[Profile], posts: &[Post], comments: &[Comment]) -> Result<()> {
        let mut conn = self.db.get_connection().await?;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                for chunk in profiles.chunks(INSERT_CHUNK) {
                    diesel::insert_into(schema::profiles::table)
                        .values(chunk)
                        .on_conflict(schema::profiles::id)
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }
                for chunk in posts.chunks(INSERT_CHUNK) {
                    diesel::insert_into(schema::posts::table)
                        .values(chunk)
                        .on_conflict(schema::posts::id)
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }
                for chunk in comments.chunks(INSERT_CHUNK) {
                    diesel::insert_into(schema::comments::table)
                        .values(chunk)
                        .on_conflict(schema::comments::id)
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .context("Failed to upsert reconciled entities")?;

        debug!(
            profiles = profiles.len(),
            posts = posts.len(),
            comments = comments.len(),
            "Flushed entities"
        );
        Ok(())
    }

    async fn last_processed_block(&self, indexer_id: &str) -> Result<Option<u64>> {
        let mut conn = self.db.get_connection().await?;
        let progress = schema::indexer_progress::table
            .find(indexer_id)
            .select(IndexerProgress::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        progress
            .map(|p| {
                u64::try_from(p.last_block_processed)
                    .context("Negative block number in indexer_progress")
            })
            .transpose()
    }

    async fn record_progress(&self, indexer_id: &str, block: u64) -> Result<()> {
        let mut conn = self.db.get_connection().await?;

        let progress = NewIndexerProgress {
            id: indexer_id.to_string(),
            last_block_processed: i64::try_from(block)?,
            last_processed_at: Utc::now(),
        };

        diesel::insert_into(schema::indexer_progress::table)
            .values(&progress)
            .on_conflict(schema::indexer_progress::id)
            .do_update()
            .set(&progress)
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
