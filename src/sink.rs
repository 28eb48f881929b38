//! Batched commit of new records.
//!
//! Records are buffered and appended to the store once the buffer reaches the
//! flush threshold. [`CommitSink::flush_remaining`] must be called when the
//! run ends, whatever the outcome, so nothing buffered is dropped.
//!
//! A failed flush leaves the batch in the buffer and returns the error; no
//! retry is attempted here.

use crate::error::StoreError;
use crate::models::ArticleRecord;
use crate::store::Repository;
use tracing::{error, info, instrument};

#[derive(Debug)]
pub struct CommitSink<'a, R> {
    store: &'a mut R,
    threshold: usize,
    buffer: Vec<ArticleRecord>,
    committed: Vec<ArticleRecord>,
    flushes: usize,
}

impl<'a, R: Repository> CommitSink<'a, R> {
    pub fn new(store: &'a mut R, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            store,
            threshold,
            buffer: Vec::with_capacity(threshold),
            committed: Vec::new(),
            flushes: 0,
        }
    }

    /// Buffer a record, flushing when the threshold is reached.
    pub async fn push(&mut self, record: ArticleRecord) -> Result<(), StoreError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush whatever is buffered (no-op when empty).
    pub async fn flush_remaining(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.flush().await
    }

    #[instrument(level = "info", skip(self), fields(count = self.buffer.len()))]
    async fn flush(&mut self) -> Result<(), StoreError> {
        match self.store.append(&self.buffer).await {
            Ok(()) => {
                self.flushes += 1;
                info!(count = self.buffer.len(), flush = self.flushes, "Uploaded batch");
                self.committed.append(&mut self.buffer);
                Ok(())
            }
            Err(e) => {
                error!(count = self.buffer.len(), error = %e, "Batch upload failed");
                Err(e)
            }
        }
    }

    /// Records buffered but not yet committed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of successful flushes so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Records committed so far, in commit order.
    #[cfg(test)]
    pub fn committed(&self) -> &[ArticleRecord] {
        &self.committed
    }

    pub fn into_committed(self) -> Vec<ArticleRecord> {
        self.committed
    }
}
