//! Prometheus counters for the indexing pipeline.

use anyhow::Result;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub struct IndexerMetrics {
    registry: Registry,
    pub events_decoded: IntCounterVec,
    pub events_dropped: IntCounterVec,
    pub entities_upserted: IntCounterVec,
    pub stubs_synthesized: IntCounterVec,
    pub metadata_fetches: IntCounterVec,
    pub documents_indexed: IntCounter,
    pub batches_processed: IntCounter,
    pub last_block: IntGauge,
}

impl IndexerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_decoded = IntCounterVec::new(
            Opts::new("lens_events_decoded_total", "Lens events decoded from raw logs"),
            &["kind"],
        )?;
        let events_dropped = IntCounterVec::new(
            Opts::new("lens_events_dropped_total", "Lens events dropped after a decode failure"),
            &["kind"],
        )?;
        let entities_upserted = IntCounterVec::new(
            Opts::new("lens_entities_upserted_total", "Entities newly inserted per collection"),
            &["collection"],
        )?;
        let stubs_synthesized = IntCounterVec::new(
            Opts::new("lens_stubs_synthesized_total", "Placeholder entities created for forward references"),
            &["collection"],
        )?;
        let metadata_fetches = IntCounterVec::new(
            Opts::new("lens_metadata_fetches_total", "Metadata lookups by outcome"),
            &["outcome"],
        )?;
        let documents_indexed = IntCounter::new(
            "lens_documents_indexed_total",
            "Documents submitted to the search index",
        )?;
        let batches_processed = IntCounter::new(
            "lens_batches_processed_total",
            "Block batches fully processed",
        )?;
        let last_block = IntGauge::new("lens_last_block", "Last block durably processed")?;

        registry.register(Box::new(events_decoded.clone()))?;
        registry.register(Box::new(events_dropped.clone()))?;
        registry.register(Box::new(entities_upserted.clone()))?;
        registry.register(Box::new(stubs_synthesized.clone()))?;
        registry.register(Box::new(metadata_fetches.clone()))?;
        registry.register(Box::new(documents_indexed.clone()))?;
        registry.register(Box::new(batches_processed.clone()))?;
        registry.register(Box::new(last_block.clone()))?;

        Ok(Self {
            registry,
            events_decoded,
            events_dropped,
            entities_upserted,
            stubs_synthesized,
            metadata_fetches,
            documents_indexed,
            batches_processed,
            last_block,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
