// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

//! Event-to-entity reconciliation.
//!
//! One pass takes the typed events of a batch, preloads every entity they can
//! reference, merges the events into a two-tier map (preloaded snapshot plus
//! entities created in this pass) and flushes the result. Any identifier an
//! event references ends up with an entity in the output, synthesizing a stub
//! when the defining event has not been seen.

mod keys;
mod lookaside;

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::events::{CommentCreatedEvent, EventBatch, PostCreatedEvent, ProfileCreatedEvent};
use crate::models::profile::profile_key;
use crate::models::{Comment, Post, Profile};
use crate::store::EntityStore;

pub use keys::{CompositeKeyScheme, PubRef};
pub use lookaside::LookAside;

/// Keys an event batch may touch, per collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeySet {
    pub profiles: BTreeSet<String>,
    pub posts: BTreeSet<String>,
    pub comments: BTreeSet<String>,
}

/// Rows already stored for a `KeySet`.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub profiles: Vec<Profile>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub profiles_created: usize,
    pub profile_stubs: usize,
    pub posts_created: usize,
    pub post_stubs: usize,
    pub comments_created: usize,
}

/// Output of one pass: everything preloaded or created, ready for upsert.
#[derive(Debug, Default, Clone)]
pub struct ReconciledEntities {
    pub profiles: Vec<Profile>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub stats: ReconcileStats,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    scheme: CompositeKeyScheme,
}

impl Reconciler {
    pub fn new(scheme: CompositeKeyScheme) -> Self {
        Self { scheme }
    }

    fn pub_key(&self, pub_ref: PubRef) -> String {
        self.scheme.key(pub_ref.profile_id, pub_ref.pub_id)
    }

    /// Run a full pass: lookup, merge, flush. Storage errors abort the batch
    /// before anything is written.
    pub async fn reconcile(&self, store: &dyn EntityStore, events: &EventBatch) -> Result<ReconciledEntities> {
        let keys = self.collect_keys(events);
        let snapshot = load_snapshot(store, &keys).await?;

        let reconciled = self.merge(events, snapshot);

        store
            .upsert_all(&reconciled.profiles, &reconciled.posts, &reconciled.comments)
            .await?;

        info!(
            profiles = reconciled.profiles.len(),
            posts = reconciled.posts.len(),
            comments = reconciled.comments.len(),
            profile_stubs = reconciled.stats.profile_stubs,
            post_stubs = reconciled.stats.post_stubs,
            "Reconciled batch"
        );
        Ok(reconciled)
    }

    /// Every key the batch references, own and pointed-to alike.
    pub fn collect_keys(&self, events: &EventBatch) -> KeySet {
        let mut keys = KeySet::default();

        for profile in &events.profiles {
            keys.profiles.insert(profile_key(profile.profile_id));
        }

        for post in &events.posts {
            keys.posts.insert(self.pub_key(post.pub_ref()));
            keys.profiles.insert(profile_key(post.profile_id));
        }

        for comment in &events.comments {
            let own = self.pub_key(comment.pub_ref());
            let pointed = self.pub_key(comment.pointed_ref());
            keys.posts.insert(own.clone());
            keys.posts.insert(pointed.clone());
            keys.comments.insert(own);
            keys.comments.insert(pointed);
            keys.profiles.insert(profile_key(comment.profile_id));
            keys.profiles.insert(profile_key(comment.profile_id_pointed));
        }

        keys
    }

    /// Merge the batch into the preloaded rows. Profiles go first, then posts,
    /// then comments, since each depends on the ones before it.
    pub fn merge(&self, events: &EventBatch, snapshot: Snapshot) -> ReconciledEntities {
        let mut pass = Pass {
            scheme: self.scheme,
            profiles: LookAside::preload(snapshot.profiles),
            posts: LookAside::preload(snapshot.posts),
            comments: LookAside::preload(snapshot.comments),
            stats: ReconcileStats::default(),
        };

        for event in &events.profiles {
            pass.apply_profile(event);
        }
        for event in &events.posts {
            pass.apply_post(event);
        }
        for event in &events.comments {
            pass.apply_comment(event);
        }

        ReconciledEntities {
            profiles: pass.profiles.into_entities(),
            posts: pass.posts.into_entities(),
            comments: pass.comments.into_entities(),
            stats: pass.stats,
        }
    }
}

async fn load_snapshot(store: &dyn EntityStore, keys: &KeySet) -> Result<Snapshot> {
    let profile_keys: Vec<String> = keys.profiles.iter().cloned().collect();
    let post_keys: Vec<String> = keys.posts.iter().cloned().collect();
    let comment_keys: Vec<String> = keys.comments.iter().cloned().collect();

    let snapshot = Snapshot {
        profiles: store.find_profiles(&profile_keys).await?,
        posts: store.find_posts(&post_keys).await?,
        comments: store.find_comments(&comment_keys).await?,
    };

    debug!(
        profiles = snapshot.profiles.len(),
        posts = snapshot.posts.len(),
        comments = snapshot.comments.len(),
        "Preloaded stored entities"
    );
    Ok(snapshot)
}

struct Pass {
    scheme: CompositeKeyScheme,
    profiles: LookAside<Profile>,
    posts: LookAside<Post>,
    comments: LookAside<Comment>,
    stats: ReconcileStats,
}

impl Pass {
    fn apply_profile(&mut self, event: &ProfileCreatedEvent) {
        let key = profile_key(event.profile_id);
        let (_, created) = self.profiles.get_or_create(&key, || event.into_model());

        if created {
            self.stats.profiles_created += 1;
        } else {
            debug!(profile_id = event.profile_id, "Profile already known, keeping first write");
        }
    }

    fn apply_post(&mut self, event: &PostCreatedEvent) {
        let referrer = event.pub_ref();
        let creator = self.ensure_profile(event.profile_id, event.created_at, referrer);

        let key = self.scheme.key(event.profile_id, event.pub_id);
        let (_, created) = self.posts.get_or_create(&key, || Post {
            id: key.clone(),
            post_id: event.pub_id,
            profile_id: event.profile_id,
            content_uri: non_empty(&event.content_uri),
            creator_profile_id: creator,
            created_at: event.created_at,
        });

        if created {
            self.stats.posts_created += 1;
        }
    }

    fn apply_comment(&mut self, event: &CommentCreatedEvent) {
        let referrer = event.pub_ref();
        let pointed = event.pointed_ref();

        let pointed_profile = self.ensure_profile(pointed.profile_id, event.created_at, referrer);
        let pointed_post = self.ensure_post(pointed, &pointed_profile, None, event.created_at, referrer);
        let commenter = self.ensure_profile(event.profile_id, event.created_at, referrer);
        // comments share the post key space, so the comment's own key must exist as a post too
        let own_post = self.ensure_post(
            referrer,
            &commenter,
            non_empty(&event.content_uri),
            event.created_at,
            referrer,
        );

        let (_, created) = self.comments.get_or_create(&own_post, || Comment {
            id: own_post.clone(),
            comment_id: event.pub_id,
            profile_id: event.profile_id,
            content_uri: non_empty(&event.content_uri),
            commenter_profile_id: commenter.clone(),
            post_id: own_post.clone(),
            original_post_id: event.pub_id_pointed,
            original_post_ref: pointed_post.clone(),
            original_profile_id: event.profile_id_pointed,
            original_profile_ref: pointed_profile.clone(),
            created_at: event.created_at,
        });

        if created {
            self.stats.comments_created += 1;
        }
    }

    /// Key of the profile, creating a stub if nothing is known about it yet.
    fn ensure_profile(&mut self, profile_id: i64, at: DateTime<Utc>, referrer: PubRef) -> String {
        let key = profile_key(profile_id);
        let (_, created) = self
            .profiles
            .get_or_create(&key, || Profile::stub(profile_id, at));

        if created {
            self.stats.profile_stubs += 1;
            debug!(
                profile_id,
                referenced_by = %referrer,
                "Missing profile {} for publication {}, creating it", profile_id, referrer
            );
        }
        key
    }

    fn ensure_post(
        &mut self,
        post: PubRef,
        creator: &str,
        content_uri: Option<String>,
        at: DateTime<Utc>,
        referrer: PubRef,
    ) -> String {
        let key = self.scheme.key(post.profile_id, post.pub_id);
        let (_, created) = self.posts.get_or_create(&key, || Post {
            id: key.clone(),
            post_id: post.pub_id,
            profile_id: post.profile_id,
            content_uri,
            creator_profile_id: creator.to_string(),
            created_at: at,
        });

        if created {
            self.stats.post_stubs += 1;
            debug!(
                post = %post,
                referenced_by = %referrer,
                "Post {} for comment {} could not be found, creating it", post, referrer
            );
        }
        key
    }
}

fn non_empty(uri: &str) -> Option<String> {
    (!uri.is_empty()).then(|| uri.to_string())
}
