// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::events::{EventBatch, EventDecoder};
use crate::metadata::MetadataFetcher;
use crate::metrics::IndexerMetrics;
use crate::models::ContentRef;
use crate::reconcile::{CompositeKeyScheme, ReconciledEntities, Reconciler};
use crate::search::SearchIndexClient;
use crate::source::{LogBatch, LogSource};
use crate::store::EntityStore;

/// Identity of one indexer deployment.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub contract_address: String,
    pub key_scheme: CompositeKeyScheme,
    pub engine_id: String,
    pub indexer_id: String,
}

/// What one batch did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub to_block: u64,
    pub events: usize,
    pub dropped: usize,
    pub profiles: usize,
    pub posts: usize,
    pub comments: usize,
    pub documents_indexed: usize,
}

/// Lens indexer worker that drives raw logs through decode, reconcile,
/// persist and search indexing.
pub struct LensIndexerWorker {
    store: Arc<dyn EntityStore>,
    decoder: EventDecoder,
    reconciler: Reconciler,
    metadata: MetadataFetcher,
    search: SearchIndexClient,
    engine_id: String,
    indexer_id: String,
    metrics: Arc<IndexerMetrics>,
}

impl LensIndexerWorker {
    pub fn new(
        options: WorkerOptions,
        store: Arc<dyn EntityStore>,
        metadata: MetadataFetcher,
        search: SearchIndexClient,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        Self {
            store,
            decoder: EventDecoder::new(&options.contract_address),
            reconciler: Reconciler::new(options.key_scheme),
            metadata,
            search,
            engine_id: options.engine_id,
            indexer_id: options.indexer_id,
            metrics,
        }
    }

    /// Last block this indexer recorded as done, where a restart resumes.
    pub async fn resume_point(&self) -> Result<Option<u64>> {
        self.store.last_processed_block(&self.indexer_id).await
    }

    /// Process batches one at a time until the source runs dry. The first
    /// failing batch stops the run without recording progress for it.
    pub async fn run(&self, source: &mut dyn LogSource) -> Result<u64> {
        let mut batches = 0;

        while let Some(batch) = source.next_batch().await? {
            let from_block = batch.from_block;
            let to_block = batch.to_block;

            if let Err(e) = self.process_batch(&batch).await {
                error!(from_block, to_block, error = %e, "Failed to process batch");
                return Err(e);
            }
            batches += 1;
        }

        info!(batches, "Log source exhausted");
        Ok(batches)
    }

    pub async fn process_batch(&self, batch: &LogBatch) -> Result<BatchSummary> {
        info!(
            from_block = batch.from_block,
            to_block = batch.to_block,
            entries = batch.entries.len(),
            "Processing batch"
        );

        let events = self.decoder.decode_batch(&batch.entries);
        self.record_decoded(&events);

        let mut summary = BatchSummary {
            to_block: batch.to_block,
            events: events.len(),
            dropped: events.dropped.len(),
            ..BatchSummary::default()
        };

        if !events.is_empty() {
            let reconciled = self
                .reconciler
                .reconcile(self.store.as_ref(), &events)
                .await
                .with_context(|| {
                    format!(
                        "Failed to persist entities for blocks {}..={}",
                        batch.from_block, batch.to_block
                    )
                })?;
            self.record_reconciled(&reconciled);

            summary.profiles = reconciled.profiles.len();
            summary.posts = reconciled.posts.len();
            summary.comments = reconciled.comments.len();

            let posts: Vec<ContentRef> = reconciled.posts.iter().map(ContentRef::from).collect();
            summary.documents_indexed += self.index_collection("posts", &posts).await?;

            let comments: Vec<ContentRef> =
                reconciled.comments.iter().map(ContentRef::from).collect();
            summary.documents_indexed += self.index_collection("comments", &comments).await?;
        }

        self.store
            .record_progress(&self.indexer_id, batch.to_block)
            .await
            .context("Failed to record indexer progress")?;

        self.metrics.batches_processed.inc();
        self.metrics
            .last_block
            .set(i64::try_from(batch.to_block).unwrap_or(i64::MAX));

        info!(
            to_block = batch.to_block,
            events = summary.events,
            documents = summary.documents_indexed,
            "Processed batch"
        );
        Ok(summary)
    }

    /// Fetch metadata for `items` and push the resulting documents to the
    /// search index. Returns the number of documents submitted.
    async fn index_collection(&self, collection: &str, items: &[ContentRef]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let fetched = self
            .metadata
            .fetch_metadata(items)
            .await
            .with_context(|| format!("Failed to fetch {collection} metadata"))?;

        let with_uri = items
            .iter()
            .filter(|i| i.content_uri.as_deref().is_some_and(|u| !u.is_empty()))
            .count();
        let documents: Vec<Value> = fetched.into_iter().flatten().collect();

        self.metrics
            .metadata_fetches
            .with_label_values(&["found"])
            .inc_by(documents.len() as u64);
        self.metrics
            .metadata_fetches
            .with_label_values(&["absent"])
            .inc_by(with_uri.saturating_sub(documents.len()) as u64);

        debug!(collection, items = items.len(), documents = documents.len(), "Fetched metadata");

        let sent = self
            .search
            .insert(&self.engine_id, &documents)
            .await
            .with_context(|| format!("Failed to index {collection} documents"))?;
        self.metrics.documents_indexed.inc_by(sent as u64);

        Ok(sent)
    }

    fn record_decoded(&self, events: &EventBatch) {
        let decoded = [
            ("ProfileCreated", events.profiles.len()),
            ("PostCreated", events.posts.len()),
            ("CommentCreated", events.comments.len()),
        ];
        for (kind, count) in decoded {
            self.metrics
                .events_decoded
                .with_label_values(&[kind])
                .inc_by(count as u64);
        }
        for kind in &events.dropped {
            self.metrics
                .events_dropped
                .with_label_values(&[kind.as_str()])
                .inc();
        }
    }

    fn record_reconciled(&self, reconciled: &ReconciledEntities) {
        // preloaded rows are skipped by the insert, so only new ones count
        let stats = &reconciled.stats;
        let upserted = &self.metrics.entities_upserted;
        upserted
            .with_label_values(&["profiles"])
            .inc_by((stats.profiles_created + stats.profile_stubs) as u64);
        upserted
            .with_label_values(&["posts"])
            .inc_by((stats.posts_created + stats.post_stubs) as u64);
        upserted
            .with_label_values(&["comments"])
            .inc_by(stats.comments_created as u64);

        let stubs = &self.metrics.stubs_synthesized;
        stubs
            .with_label_values(&["profiles"])
            .inc_by(reconciled.stats.profile_stubs as u64);
        stubs
            .with_label_values(&["posts"])
            .inc_by(reconciled.stats.post_stubs as u64);
    }
}
