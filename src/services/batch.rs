use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::allocator::ShortCodeAllocator;
use crate::errors::ServiceError;
use crate::models::{ChunkReport, NewShortUrl};
use crate::repositories::{InsertOutcome, ShortUrlRepositoryTrait};

#[derive(Debug)]
pub enum BatchOutcome {
    Completed,
    /// Stopped between chunks because the token was cancelled
    Cancelled,
    /// A chunk hit an error that retrying with new codes cannot fix
    Failed(ServiceError),
}

/// What a persistence run actually did.
#[derive(Debug)]
pub struct BatchReport {
    /// Records as committed, including any that were re-coded on the way
    pub committed: Vec<NewShortUrl>,
    pub chunks: Vec<ChunkReport>,
    /// Records never committed, in their original order
    pub pending: Vec<NewShortUrl>,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Completed)
    }
}

/// Writes allocated records chunk by chunk. Each chunk commits entirely or
/// not at all; a chunk rejected for a taken code gets new codes for the
/// conflicting records only and is tried again.
pub struct BatchPersistenceCoordinator<R: ShortUrlRepositoryTrait> {
    repository: Arc<R>,
    chunk_size: usize,
    max_chunk_attempts: u32,
}

impl<R: ShortUrlRepositoryTrait> BatchPersistenceCoordinator<R> {
    pub fn new(repository: Arc<R>, chunk_size: usize, max_chunk_attempts: u32) -> Self {
        Self {
            repository,
            chunk_size: chunk_size.max(1),
            max_chunk_attempts: max_chunk_attempts.max(1),
        }
    }

    /// Persist `records` in chunks, checking `cancel` before each chunk.
    ///
    /// `known` must hold every code the allocator has handed out for this
    /// request; codes discovered to be taken are added to it.
    pub async fn persist(
        &self,
        allocator: &ShortCodeAllocator,
        records: Vec<NewShortUrl>,
        known: &mut HashSet<String>,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let mut committed = Vec::with_capacity(records.len());
        let mut chunks = Vec::new();
        let mut remaining = records.into_iter();
        let mut index = 0;

        let outcome = loop {
            if remaining.as_slice().is_empty() {
                break BatchOutcome::Completed;
            }

            if cancel.is_cancelled() {
                warn!(
                    "Batch cancelled after {} chunks, {} records pending",
                    index,
                    remaining.len()
                );
                break BatchOutcome::Cancelled;
            }

            let mut chunk: Vec<NewShortUrl> = remaining.by_ref().take(self.chunk_size).collect();

            match self.persist_chunk(index, allocator, &mut chunk, known).await {
                Ok(retries) => {
                    let report = ChunkReport {
                        index,
                        committed: chunk.len(),
                        pending: remaining.len(),
                        retries,
                    };
                    info!(
                        "chunk {}: {} committed, {} pending",
                        index, report.committed, report.pending
                    );
                    committed.extend(chunk);
                    chunks.push(report);
                }
                Err(e) => {
                    warn!("chunk {} failed: {}", index, e);
                    let pending: Vec<NewShortUrl> = chunk.into_iter().chain(remaining).collect();
                    return BatchReport {
                        committed,
                        chunks,
                        pending,
                        outcome: BatchOutcome::Failed(e),
                    };
                }
            }

            index += 1;
        };

        BatchReport {
            committed,
            chunks,
            pending: remaining.collect(),
            outcome,
        }
    }

    /// Returns the number of rejected attempts before the chunk committed.
    async fn persist_chunk(
        &self,
        index: usize,
        allocator: &ShortCodeAllocator,
        chunk: &mut [NewShortUrl],
        known: &mut HashSet<String>,
    ) -> Result<u32, ServiceError> {
        for attempt in 0..self.max_chunk_attempts {
            let conflicting = match self.repository.insert_batch(chunk).await? {
                InsertOutcome::Committed(_) => return Ok(attempt),
                InsertOutcome::UniqueViolation(codes) => codes,
            };

            warn!(
                "chunk {}: {} codes already taken (attempt {}), re-coding them",
                index,
                conflicting.len(),
                attempt + 1
            );

            let conflicting: HashSet<String> = conflicting.into_iter().collect();
            known.extend(conflicting.iter().cloned());

            for record in chunk
                .iter_mut()
                .filter(|r| conflicting.contains(&r.short_code))
            {
                record.short_code = allocator.allocate_one(known)?;
            }
        }

        Err(ServiceError::AllocationExhausted {
            attempts: self.max_chunk_attempts,
        })
    }
}
