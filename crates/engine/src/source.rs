//! Work item sources: where a job's items (questions, answers to score) come
//! from and where their outcomes are recorded.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use evalrun_core::{ItemId, ItemOutcome, ItemTally, JobId, WorkItem};

/// Item source error. Any of these is fatal to the job being processed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
    #[error("unknown item {item_id} in job {job_id}")]
    UnknownItem { job_id: JobId, item_id: ItemId },
    #[error("item source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies a job's items in a stable order and records their outcomes.
pub trait WorkItemSource: Send + Sync {
    /// Up to `limit` items with `position > after` (all items when `after` is
    /// `None`), ascending by position.
    ///
    /// Items that already carry an outcome are returned too; the worker skips
    /// them without executing or counting them again.
    fn fetch_pending(
        &self,
        job_id: JobId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<WorkItem>, SourceError>;

    /// Record an item's outcome. `detail` is the executor output (or null).
    ///
    /// Idempotent: an item that already has an outcome keeps it.
    fn mark_result(
        &self,
        job_id: JobId,
        item_id: ItemId,
        outcome: ItemOutcome,
        detail: serde_json::Value,
    ) -> Result<(), SourceError>;

    /// Terminal counts as the source sees them.
    fn tally(&self, job_id: JobId) -> Result<ItemTally, SourceError>;
}

impl<S> WorkItemSource for Arc<S>
where
    S: WorkItemSource + ?Sized,
{
    fn fetch_pending(
        &self,
        job_id: JobId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<WorkItem>, SourceError> {
        (**self).fetch_pending(job_id, after, limit)
    }

    fn mark_result(
        &self,
        job_id: JobId,
        item_id: ItemId,
        outcome: ItemOutcome,
        detail: serde_json::Value,
    ) -> Result<(), SourceError> {
        (**self).mark_result(job_id, item_id, outcome, detail)
    }

    fn tally(&self, job_id: JobId) -> Result<ItemTally, SourceError> {
        (**self).tally(job_id)
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    item: WorkItem,
    detail: serde_json::Value,
}

/// In-memory item source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryWorkItemSource {
    jobs: RwLock<HashMap<JobId, Vec<StoredItem>>>,
    unavailable: RwLock<Option<String>>,
}

impl InMemoryWorkItemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register `items` for `job_id`, keeping the list ordered by position.
    pub fn add_items(&self, job_id: JobId, items: impl IntoIterator<Item = WorkItem>) -> Result<(), SourceError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let list = jobs.entry(job_id).or_default();
        list.extend(items.into_iter().map(|item| StoredItem {
            item,
            detail: serde_json::Value::Null,
        }));
        list.sort_by_key(|s| s.item.position);
        Ok(())
    }

    /// Register `count` items at positions `1..=count` with `{"index": n}` payloads.
    pub fn seed(&self, job_id: JobId, count: u64) -> Result<Vec<WorkItem>, SourceError> {
        let items: Vec<_> = (1..=count)
            .map(|n| WorkItem::new(n, serde_json::json!({ "index": n })))
            .collect();
        self.add_items(job_id, items.clone())?;
        Ok(items)
    }

    /// Every item of a job with its current outcome.
    pub fn items(&self, job_id: JobId) -> Result<Vec<WorkItem>, SourceError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let list = jobs.get(&job_id).ok_or(SourceError::UnknownJob(job_id))?;
        Ok(list.iter().map(|s| s.item.clone()).collect())
    }

    /// The detail recorded alongside an item's outcome.
    pub fn detail(&self, job_id: JobId, position: u64) -> Result<Option<serde_json::Value>, SourceError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let list = jobs.get(&job_id).ok_or(SourceError::UnknownJob(job_id))?;
        Ok(list
            .iter()
            .find(|s| s.item.position == position)
            .map(|s| s.detail.clone()))
    }

    /// Simulate an outage (`Some(reason)`) or restore service (`None`).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.unavailable.write() {
            *guard = reason.map(str::to_string);
        }
    }

    fn ensure_available(&self) -> Result<(), SourceError> {
        let guard = self.unavailable.read().map_err(poisoned)?;
        match guard.as_ref() {
            Some(reason) => Err(SourceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

fn poisoned<T>(_: T) -> SourceError {
    SourceError::Unavailable("item source lock poisoned".to_string())
}

impl WorkItemSource for InMemoryWorkItemSource {
    fn fetch_pending(
        &self,
        job_id: JobId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<WorkItem>, SourceError> {
        self.ensure_available()?;
        let jobs = self.jobs.read().map_err(poisoned)?;
        let Some(list) = jobs.get(&job_id) else {
            return Ok(Vec::new());
        };
        Ok(list
            .iter()
            .filter(|s| after.is_none_or(|a| s.item.position > a))
            .take(limit)
            .map(|s| s.item.clone())
            .collect())
    }

    fn mark_result(
        &self,
        job_id: JobId,
        item_id: ItemId,
        outcome: ItemOutcome,
        detail: serde_json::Value,
    ) -> Result<(), SourceError> {
        self.ensure_available()?;
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let list = jobs.get_mut(&job_id).ok_or(SourceError::UnknownJob(job_id))?;
        let stored = list
            .iter_mut()
            .find(|s| s.item.id == item_id)
            .ok_or(SourceError::UnknownItem { job_id, item_id })?;
        if stored.item.outcome.is_none() {
            stored.item.outcome = Some(outcome);
            stored.detail = detail;
        }
        Ok(())
    }

    fn tally(&self, job_id: JobId) -> Result<ItemTally, SourceError> {
        self.ensure_available()?;
        let jobs = self.jobs.read().map_err(poisoned)?;
        let mut tally = ItemTally::default();
        for stored in jobs.get(&job_id).into_iter().flatten() {
            match &stored.item.outcome {
                Some(ItemOutcome::Succeeded) => tally.succeeded += 1,
                Some(ItemOutcome::Failed { .. }) => tally.failed += 1,
                None => {}
            }
        }
        Ok(tally)
    }
}
