//! Steady-state page load detection.
//!
//! A [`LoadWatcher`] polls a [`Document`] on a fixed interval and fires a
//! callback once the element tree has stopped changing for a configured
//! number of consecutive ticks, or fails with a timeout.

pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod observer;
pub mod tracker;
pub mod watcher;

pub use config::WatchConfig;
pub use document::{Document, FeedPoll, MutationBatch, MutationFeed, MutationSender, mutation_channel};
pub use error::{ErrorKind, Result, WatchError};
pub use memory::MemoryDocument;
pub use observer::{ChangeObserver, ObserverDiagnostics, StrategyKind};
pub use tracker::{SteadyStateTracker, TrackerVerdict};
pub use watcher::{LoadWatcher, WatchHandle, WatchReport};
pub use tokio_util::sync::CancellationToken;
