use serde::{Deserialize, Serialize};
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::document::Document;
use crate::error::{Result, WatchError};
use crate::observer::{ChangeObserver, StrategyKind};
use crate::tracker::{SteadyStateTracker, TrackerVerdict};

type LoadCallback = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Diagnostics for a watch that reached a steady state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchReport {
    pub strategy: StrategyKind,
    pub ticks: u32,
    pub elapsed_intervals: u32,
    pub steady_intervals: u32,
    pub total_changes: u64,
    pub final_element_count: u64,
    pub duration_ms: u64,
    /// Set when the load callback failed; the watch itself still succeeded
    pub callback_error: Option<String>,
}

impl WatchReport {
    pub fn callback_succeeded(&self) -> bool {
        self.callback_error.is_none()
    }
}

/// Single-use watcher that fires a callback once the document stops changing
pub struct LoadWatcher<D: Document + ?Sized> {
    document: Arc<D>,
    config: WatchConfig,
    cancel: CancellationToken,
    used: AtomicBool,
}

impl<D: Document + ?Sized + 'static> LoadWatcher<D> {
    pub fn new(document: Arc<D>, config: WatchConfig) -> Self {
        Self {
            document,
            config,
            cancel: CancellationToken::new(),
            used: AtomicBool::new(false),
        }
    }

    /// Ties the watch to an external token, e.g. a shutdown token.
    ///
    /// The watch listens on a child of `token`: cancelling the parent stops
    /// the watch, cancelling the watch leaves the parent untouched.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::SeqCst)
    }

    /// Starts watching and returns as soon as the first tick is scheduled.
    ///
    /// Reuse, configuration and setup failures are returned here; the
    /// terminal outcome (loaded, timeout, cancellation) comes from
    /// [`WatchHandle::outcome`].
    pub async fn watch_for_load<F>(&self, callback: F) -> Result<WatchHandle>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(WatchError::Reuse);
        }
        self.config.validate()?;

        let mut observer = ChangeObserver::setup(self.document.as_ref()).await?;
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                observer.release(self.document.as_ref()).await;
                return Err(WatchError::Setup(format!("no runtime to schedule ticks on: {}", e)));
            }
        };

        info!(
            strategy = ?observer.strategy(),
            interval_ms = self.config.check_interval.as_millis() as u64,
            steady = self.config.steady_intervals_required,
            max = self.config.max_intervals,
            "Watching for page load"
        );

        let driver = Driver {
            document: Arc::clone(&self.document),
            config: self.config.clone(),
            tracker: SteadyStateTracker::new(&self.config),
            observer,
            cancel: self.cancel.clone(),
            ticks: 0,
            started: Instant::now(),
        };
        let task = runtime.spawn(driver.run(Box::new(callback)));

        Ok(WatchHandle { task, cancel: self.cancel.clone() })
    }

    /// Watches and waits for the terminal outcome
    pub async fn watch_until_loaded<F>(&self, callback: F) -> Result<WatchReport>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.watch_for_load(callback).await?.outcome().await
    }
}

pub struct WatchHandle {
    task: JoinHandle<Result<WatchReport>>,
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Stops the watch before its next tick; the callback will not run
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn outcome(self) -> Result<WatchReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WatchError::Cancelled),
            Err(e) => Err(WatchError::Aborted(e.to_string())),
        }
    }
}

struct Driver<D: Document + ?Sized> {
    document: Arc<D>,
    config: WatchConfig,
    tracker: SteadyStateTracker,
    observer: ChangeObserver,
    cancel: CancellationToken,
    ticks: u32,
    started: Instant,
}

impl<D: Document + ?Sized> Driver<D> {
    async fn run(mut self, callback: LoadCallback) -> Result<WatchReport> {
        let settled = match AssertUnwindSafe(self.tick_until_settled()).catch_unwind().await {
            Ok(settled) => settled,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(error = %message, ticks = self.ticks, "Watch task panicked");
                Err(WatchError::Aborted(format!("watch task panicked: {}", message)))
            }
        };
        self.observer.release(self.document.as_ref()).await;
        settled?;

        let callback_error = invoke_callback(callback).map(|e| e.to_string());
        Ok(self.report(callback_error))
    }

    async fn tick_until_settled(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(ticks = self.ticks, "Watch cancelled");
                    return Err(WatchError::Cancelled);
                }
                _ = sleep(self.config.check_interval) => {}
            }

            self.ticks += 1;
            let changed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(ticks = self.ticks, "Watch cancelled during tick");
                    return Err(WatchError::Cancelled);
                }
                changed = self.observer.changed_since_last_tick(self.document.as_ref()) => changed?,
            };

            match self.tracker.record(changed) {
                TrackerVerdict::Loaded => {
                    info!(
                        ticks = self.ticks,
                        elapsed_ms = self.elapsed_ms(),
                        "✓ Page settled"
                    );
                    return Ok(());
                }
                TrackerVerdict::TimedOut => {
                    let intervals = self.tracker.elapsed_intervals();
                    warn!(intervals, "⚠ Page did not settle within budget");
                    return Err(WatchError::Timeout { intervals, elapsed_ms: self.elapsed_ms() });
                }
                TrackerVerdict::Pending => {
                    debug!(
                        tick = self.ticks,
                        changed,
                        steady = self.tracker.consecutive_steady_intervals(),
                        elapsed = self.tracker.elapsed_intervals(),
                        "Page not settled yet"
                    );
                }
            }
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn report(&self, callback_error: Option<String>) -> WatchReport {
        let diagnostics = self.observer.diagnostics();
        WatchReport {
            strategy: diagnostics.strategy,
            ticks: self.ticks,
            elapsed_intervals: self.tracker.elapsed_intervals(),
            steady_intervals: self.tracker.consecutive_steady_intervals(),
            total_changes: diagnostics.total_changes,
            final_element_count: diagnostics.last_element_count,
            duration_ms: self.elapsed_ms(),
            callback_error,
        }
    }
}

/// Runs the callback, containing both errors and panics
fn invoke_callback(callback: LoadCallback) -> Option<WatchError> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!(error = %format!("{:#}", e), "Load callback failed");
            Some(WatchError::Callback(format!("{:#}", e)))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "Load callback panicked");
            Some(WatchError::Callback(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
