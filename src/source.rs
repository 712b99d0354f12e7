//! Raw log sources feeding the indexer.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::RawLogEntry;

/// Raw logs of a contiguous block range, in log order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub from_block: u64,
    pub to_block: u64,
    pub entries: Vec<RawLogEntry>,
}

#[async_trait]
pub trait LogSource: Send {
    /// Next batch of logs, or `None` once the source is exhausted.
    async fn next_batch(&mut self) -> Result<Option<LogBatch>>;
}

/// Replays a JSONL file with one `eth_getLogs` entry per line.
///
/// Entries must be ordered by block. Each batch covers at most `batch_blocks`
/// distinct blocks and never splits a block. Blocks at or below
/// `resume_after` are skipped.
pub struct JsonlLogSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    batch_blocks: usize,
    resume_after: Option<u64>,
    pending: Option<RawLogEntry>,
    last_block: Option<u64>,
}

impl JsonlLogSource {
    pub fn open(path: impl AsRef<Path>, batch_blocks: usize, resume_after: Option<u64>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Failed to open log source {}", path.display()))?;

        if let Some(block) = resume_after {
            info!(path = %path.display(), block, "Resuming log replay after block");
        }

        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            line_no: 0,
            batch_blocks: batch_blocks.max(1),
            resume_after,
            pending: None,
            last_block: None,
        })
    }

    fn next_entry(&mut self) -> Result<Option<RawLogEntry>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }

        while let Some(line) = self.lines.next() {
            self.line_no += 1;
            let line = line.with_context(|| {
                format!("Failed to read {} line {}", self.path.display(), self.line_no)
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: RawLogEntry = match serde_json::from_str(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "Skipping malformed log entry");
                    continue;
                }
            };

            if let Some(last) = self.last_block {
                if entry.block_number < last {
                    bail!(
                        "log entries out of order at line {}: block {} after block {}",
                        self.line_no,
                        entry.block_number,
                        last
                    );
                }
            }
            self.last_block = Some(entry.block_number);

            if self.resume_after.is_some_and(|b| entry.block_number <= b) {
                continue;
            }
            return Ok(Some(entry));
        }

        Ok(None)
    }
}

#[async_trait]
impl LogSource for JsonlLogSource {
    async fn next_batch(&mut self) -> Result<Option<LogBatch>> {
        let Some(first) = self.next_entry()? else {
            return Ok(None);
        };

        let from_block = first.block_number;
        let mut to_block = from_block;
        let mut blocks = 1;
        let mut entries = vec![first];

        while let Some(entry) = self.next_entry()? {
            if entry.block_number != to_block {
                if blocks == self.batch_blocks {
                    self.pending = Some(entry);
                    break;
                }
                blocks += 1;
                to_block = entry.block_number;
            }
            entries.push(entry);
        }

        debug!(from_block, to_block, entries = entries.len(), "Read log batch");
        Ok(Some(LogBatch {
            from_block,
            to_block,
            entries,
        }))
    }
}
