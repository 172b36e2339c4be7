//! Chromium-backed page load detection.
//!
//! [`ChromiumDocument`] exposes a CDP page to the `settle_core` watcher,
//! preferring a page-side `MutationObserver` and falling back to polling the
//! element count. [`PageLoader`] wraps browser launch and navigation around it.

pub mod shared;
pub mod worker;

pub use shared::{LaunchConfig, to_watch_error};
pub use worker::{ChromiumDocument, PageLoadResult, PageLoader};
