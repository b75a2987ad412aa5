use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::devops::{FetchError, QueryError, WorkItemSource};
use crate::model::detail::RawDetail;
use crate::model::work_item::{Record, RecordKind, WorkItemId};
use crate::normalize::{normalize_kind, NormalizationError};

/// Why a single item was left out of a batch.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: WorkItemId,
    pub reason: String,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct Batch<T> {
    /// Normalized records, in the order the query listed their ids.
    pub records: Vec<T>,
    /// Number of ids the query returned.
    pub requested: usize,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

impl<T> Batch<T> {
    fn empty(cancelled: bool) -> Self {
        Self {
            records: Vec::new(),
            requested: 0,
            failures: Vec::new(),
            cancelled,
        }
    }

    /// True when every requested id produced a record.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.records.len() == self.requested
    }

    pub fn dropped(&self) -> usize {
        self.requested.saturating_sub(self.records.len())
    }
}

/// Query, fan out detail fetches, normalize.
///
/// Fetches run as separate tasks, at most `concurrency` at a time. A failed
/// fetch or normalization drops only that item. Cancelling the token stops
/// new fetches, aborts in-flight ones and returns what was already
/// normalized.
pub struct Pipeline {
    source: Arc<dyn WorkItemSource>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(source: Arc<dyn WorkItemSource>, concurrency: usize) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs `query` and normalizes every match as `kind`.
    pub async fn run_kind(
        &self,
        kind: RecordKind,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Batch<Record>, QueryError> {
        self.run_with(kind, query, cancel, move |detail: &RawDetail| {
            normalize_kind(kind, detail)
        })
        .await
    }

    async fn run_with<T, F>(
        &self,
        kind: RecordKind,
        query: &str,
        cancel: &CancellationToken,
        normalizer: F,
    ) -> Result<Batch<T>, QueryError>
    where
        T: Send + 'static,
        F: Fn(&RawDetail) -> Result<T, NormalizationError> + Copy + Send + 'static,
    {
        let ids = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%kind, "cancelled before the query completed");
                return Ok(Batch::empty(true));
            }
            ids = self.source.execute_query(query) => ids?,
        };
        info!(%kind, count = ids.len(), "query matched work items");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        for (index, id) in ids.iter().copied().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            join_set.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, id, None),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, id, None),
                    },
                };
                let outcome = fetch_one(source.as_ref(), id, normalizer).await;
                (index, id, Some(outcome))
            });
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(ids.len()).collect();
        let mut failures = Vec::new();
        let mut cancelled = false;
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    warn!(%kind, "cancelled, keeping records fetched so far");
                    join_set.abort_all();
                    continue;
                }
                joined = join_set.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            match joined {
                Ok((index, _, Some(Ok(record)))) => slots[index] = Some(record),
                Ok((index, id, Some(Err(err)))) => {
                    warn!(%kind, %id, error = %err, "dropping work item");
                    failures.push((
                        index,
                        ItemFailure {
                            id,
                            reason: err.to_string(),
                        },
                    ));
                }
                // Never started: cancelled while waiting for a permit.
                Ok((_, _, None)) => {}
                Err(err) if err.is_cancelled() => {}
                Err(err) => error!(%kind, error = %err, "fetch task failed"),
            }
        }

        let records: Vec<T> = slots.into_iter().flatten().collect();
        failures.sort_by_key(|(index, _)| *index);
        let failures: Vec<ItemFailure> = failures.into_iter().map(|(_, failure)| failure).collect();
        info!(
            %kind,
            requested = ids.len(),
            returned = records.len(),
            dropped = ids.len() - records.len(),
            cancelled,
            "batch complete"
        );
        Ok(Batch {
            records,
            requested: ids.len(),
            failures,
            cancelled,
        })
    }
}

async fn fetch_one<T>(
    source: &dyn WorkItemSource,
    id: WorkItemId,
    normalizer: impl Fn(&RawDetail) -> Result<T, NormalizationError>,
) -> Result<T, ItemError> {
    let detail = source.fetch_detail(id).await?;
    Ok(normalizer(&detail)?)
}
