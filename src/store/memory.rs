use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::EntityStore;
use crate::models::{Comment, Keyed, Post, Profile};

#[derive(Debug, Default)]
struct Tables {
    profiles: BTreeMap<String, Profile>,
    posts: BTreeMap<String, Post>,
    comments: BTreeMap<String, Comment>,
    progress: HashMap<String, u64>,
    lookups: usize,
}

/// In-process `EntityStore` with the same insert-or-ignore semantics as the
/// Postgres store, for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `upsert_all` fail, simulating an unavailable database.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn profiles(&self) -> Vec<Profile> {
        self.tables.lock().await.profiles.values().cloned().collect()
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.tables.lock().await.posts.values().cloned().collect()
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.tables.lock().await.comments.values().cloned().collect()
    }

    /// Number of `find_*` calls served so far.
    pub async fn lookup_count(&self) -> usize {
        self.tables.lock().await.lookups
    }
}

fn select<T: Clone>(table: &BTreeMap<String, T>, keys: &[String]) -> Vec<T> {
    keys.iter().filter_map(|k| table.get(k).cloned()).collect()
}

fn insert_missing<T: Keyed + Clone>(table: &mut BTreeMap<String, T>, rows: &[T]) {
    for row in rows {
        table
            .entry(row.key().to_owned())
            .or_insert_with(|| row.clone());
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_profiles(&self, keys: &[String]) -> Result<Vec<Profile>> {
        let mut tables = self.tables.lock().await;
        tables.lookups += 1;
        Ok(select(&tables.profiles, keys))
    }

    async fn find_posts(&self, keys: &[String]) -> Result<Vec<Post>> {
        let mut tables = self.tables.lock().await;
        tables.lookups += 1;
        Ok(select(&tables.posts, keys))
    }

    async fn find_comments(&self, keys: &[String]) -> Result<Vec<Comment>> {
        let mut tables = self.tables.lock().await;
        tables.lookups += 1;
        Ok(select(&tables.comments, keys))
    }

    async fn upsert_all(&self, profiles: &[Profile], posts: &[Post], comments: &[Comment]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store is rejecting writes");
        }

        let mut tables = self.tables.lock().await;
        for post in posts {
            if !tables.profiles.contains_key(&post.creator_profile_id)
                && !profiles.iter().any(|p| p.id == post.creator_profile_id)
            {
                bail!("post {} references unknown profile {}", post.id, post.creator_profile_id);
            }
        }

        insert_missing(&mut tables.profiles, profiles);
        insert_missing(&mut tables.posts, posts);
        insert_missing(&mut tables.comments, comments);
        Ok(())
    }

    async fn last_processed_block(&self, indexer_id: &str) -> Result<Option<u64>> {
        Ok(self.tables.lock().await.progress.get(indexer_id).copied())
    }

    async fn record_progress(&self, indexer_id: &str, block: u64) -> Result<()> {
        self.tables
            .lock()
            .await
            .progress
            .insert(indexer_id.to_string(), block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn existing_rows_are_not_overwritten() {
        let store = MemoryStore::new();
        let mut first = Profile::stub(1, Utc::now());
        first.handle = Some("first".to_string());
        store.upsert_all(&[first], &[], &[]).await.unwrap();

        let mut second = Profile::stub(1, Utc::now());
        second.handle = Some("second".to_string());
        store.upsert_all(&[second], &[], &[]).await.unwrap();

        let rows = store.find_profiles(&["1".to_string()]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].handle.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn dangling_post_is_rejected() {
        let store = MemoryStore::new();
        let post = Post {
            id: "9-1".to_string(),
            post_id: 1,
            profile_id: 9,
            content_uri: None,
            creator_profile_id: "9".to_string(),
            created_at: Utc::now(),
        };

        assert!(store.upsert_all(&[], &[post], &[]).await.is_err());
        assert!(store.posts().await.is_empty());
    }

    #[test]
    fn progress_round_trips() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            assert_eq!(store.last_processed_block("lens").await.unwrap(), None);
            store.record_progress("lens", 42).await.unwrap();
            store.record_progress("other", 7).await.unwrap();
            assert_eq!(store.last_processed_block("lens").await.unwrap(), Some(42));
        });
    }
}
