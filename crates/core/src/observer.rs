use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{Document, FeedPoll, MutationFeed};
use crate::error::{Result, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Mutation,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverDiagnostics {
    pub strategy: StrategyKind,
    pub last_element_count: u64,
    pub total_changes: u64,
}

/// Counts change notifications between ticks
#[derive(Debug)]
pub struct MutationStrategy {
    feed: Option<MutationFeed>,
    last_element_count: u64,
    changes_since_last_tick: u64,
    total_changes: u64,
}

impl MutationStrategy {
    fn new(feed: MutationFeed, baseline: u64) -> Self {
        Self {
            feed: Some(feed),
            last_element_count: baseline,
            changes_since_last_tick: 0,
            total_changes: 0,
        }
    }

    /// Drains queued batches. Returns `None` once the feed has closed.
    fn drain(&mut self) -> Option<bool> {
        let feed = self.feed.as_mut()?;
        loop {
            match feed.poll_batch() {
                FeedPoll::Batch(batch) => {
                    if batch.element_count != self.last_element_count {
                        self.changes_since_last_tick += 1;
                        self.total_changes += 1;
                    }
                    self.last_element_count = batch.element_count;
                }
                FeedPoll::Empty => break,
                FeedPoll::Closed => {
                    self.feed = None;
                    return None;
                }
            }
        }
        let changed = self.changes_since_last_tick > 0;
        self.changes_since_last_tick = 0;
        Some(changed)
    }
}

/// Recounts elements every tick
#[derive(Debug)]
pub struct PollingStrategy {
    last_element_count: u64,
    total_changes: u64,
}

impl PollingStrategy {
    fn new(baseline: u64) -> Self {
        Self { last_element_count: baseline, total_changes: 0 }
    }

    async fn check<D: Document + ?Sized>(&mut self, document: &D) -> Result<bool> {
        let count = match document.element_count().await {
            Ok(count) => count,
            Err(WatchError::ContextLost(reason)) => {
                debug!(%reason, "document context lost, counting as a change");
                self.total_changes += 1;
                return Ok(true);
            }
            Err(e) => return Err(e),
        };
        let changed = count != self.last_element_count;
        if changed {
            self.total_changes += 1;
        }
        self.last_element_count = count;
        Ok(changed)
    }
}

/// Decides once per tick whether the document changed since the previous tick
#[derive(Debug)]
pub enum ChangeObserver {
    Mutation(MutationStrategy),
    Polling(PollingStrategy),
}

impl ChangeObserver {
    /// Prefers change notifications and falls back to polling when the
    /// document lacks them or subscribing fails.
    pub async fn setup<D: Document + ?Sized>(document: &D) -> Result<Self> {
        let baseline = document
            .element_count()
            .await
            .map_err(|e| WatchError::Setup(format!("initial element count failed: {}", e)))?;

        let observer = match document.subscribe().await {
            Ok(Some(feed)) => Self::Mutation(MutationStrategy::new(feed, baseline)),
            Ok(None) => {
                debug!("change notifications unavailable, polling element count");
                Self::Polling(PollingStrategy::new(baseline))
            }
            Err(e) => {
                debug!(error = %e, "change subscription failed, polling element count");
                Self::Polling(PollingStrategy::new(baseline))
            }
        };
        Ok(observer)
    }

    pub fn strategy(&self) -> StrategyKind {
        match self {
            Self::Mutation(_) => StrategyKind::Mutation,
            Self::Polling(_) => StrategyKind::Polling,
        }
    }

    pub async fn changed_since_last_tick<D: Document + ?Sized>(&mut self, document: &D) -> Result<bool> {
        let (last_element_count, total_changes) = match self {
            Self::Polling(polling) => return polling.check(document).await,
            Self::Mutation(mutation) => match mutation.drain() {
                Some(changed) => return Ok(changed),
                None => (mutation.last_element_count, mutation.total_changes),
            },
        };

        warn!("change notifications stopped, switching to polling");
        if let Err(e) = document.unsubscribe().await {
            debug!(error = %e, "unsubscribe failed");
        }
        let mut polling = PollingStrategy::new(last_element_count);
        polling.total_changes = total_changes;
        let changed = polling.check(document).await;
        *self = Self::Polling(polling);
        changed
    }

    pub fn diagnostics(&self) -> ObserverDiagnostics {
        let (last_element_count, total_changes) = match self {
            Self::Mutation(m) => (m.last_element_count, m.total_changes),
            Self::Polling(p) => (p.last_element_count, p.total_changes),
        };
        ObserverDiagnostics { strategy: self.strategy(), last_element_count, total_changes }
    }

    /// Drops the subscription, if any. Safe to call more than once.
    pub async fn release<D: Document + ?Sized>(&mut self, document: &D) {
        if let Self::Mutation(mutation) = self {
            if mutation.feed.take().is_some() {
                if let Err(e) = document.unsubscribe().await {
                    debug!(error = %e, "unsubscribe failed");
                }
            }
        }
    }
}
