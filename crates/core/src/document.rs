use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::error::Result;

/// One batch of DOM change notifications, with the element count taken when it fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationBatch {
    pub element_count: u64,
}

/// Producer half of a mutation subscription, held by the notification source
#[derive(Debug, Clone)]
pub struct MutationSender {
    sender: mpsc::UnboundedSender<MutationBatch>,
}

impl MutationSender {
    /// Returns false once the subscriber has gone away
    pub fn notify(&self, element_count: u64) -> bool {
        self.sender.send(MutationBatch { element_count }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FeedPoll {
    Batch(MutationBatch),
    Empty,
    /// Every sender is gone; no further notifications will arrive
    Closed,
}

/// Single-consumer queue of mutation batches, drained by the watcher at tick boundaries
#[derive(Debug)]
pub struct MutationFeed {
    receiver: mpsc::UnboundedReceiver<MutationBatch>,
}

impl MutationFeed {
    pub fn poll_batch(&mut self) -> FeedPoll {
        match self.receiver.try_recv() {
            Ok(batch) => FeedPoll::Batch(batch),
            Err(TryRecvError::Empty) => FeedPoll::Empty,
            Err(TryRecvError::Disconnected) => FeedPoll::Closed,
        }
    }
}

pub fn mutation_channel() -> (MutationSender, MutationFeed) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (MutationSender { sender }, MutationFeed { receiver })
}

/// A document tree the watcher can observe
#[async_trait]
pub trait Document: Send + Sync {
    /// Total number of element nodes, counted by a full traversal
    async fn element_count(&self) -> Result<u64>;

    /// Subscribe to structural change notifications.
    ///
    /// `Ok(None)` means the capability is absent; an error means the
    /// subscription itself failed. Either way the watcher falls back to polling.
    async fn subscribe(&self) -> Result<Option<MutationFeed>> {
        Ok(None)
    }

    /// Release whatever `subscribe` set up on the document side
    async fn unsubscribe(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_reports_batches_in_order_then_closes() {
        let (sender, mut feed) = mutation_channel();
        assert_eq!(feed.poll_batch(), FeedPoll::Empty);

        assert!(sender.notify(4));
        assert!(sender.notify(7));
        drop(sender);

        assert_eq!(feed.poll_batch(), FeedPoll::Batch(MutationBatch { element_count: 4 }));
        assert_eq!(feed.poll_batch(), FeedPoll::Batch(MutationBatch { element_count: 7 }));
        assert_eq!(feed.poll_batch(), FeedPoll::Closed);
    }

    #[test]
    fn sender_sees_dropped_feed() {
        let (sender, feed) = mutation_channel();
        assert!(!sender.is_closed());
        drop(feed);
        assert!(sender.is_closed());
        assert!(!sender.notify(1));
    }
}
