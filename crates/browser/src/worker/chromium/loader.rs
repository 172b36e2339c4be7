use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use settle_core::{CancellationToken, LoadWatcher, Result, WatchConfig, WatchError, WatchReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::document::ChromiumDocument;
use crate::shared::LaunchConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLoadResult {
    pub url: String,
    pub report: WatchReport,
}

/// Launches Chromium, navigates to a page and waits for it to settle
pub struct PageLoader {
    launch_config: LaunchConfig,
    watch_config: WatchConfig,
    cancel: CancellationToken,
}

impl Default for PageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLoader {
    pub fn new() -> Self {
        Self::with_config(LaunchConfig::default(), WatchConfig::default())
    }

    pub fn with_config(launch_config: LaunchConfig, watch_config: WatchConfig) -> Self {
        Self {
            launch_config,
            watch_config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the watch when `token` is cancelled. The loader listens on a
    /// child token, so nothing it does cancels the caller's token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token.child_token();
        self
    }

    async fn launch(config: &LaunchConfig, profile_dir: &Path) -> Result<(Browser, JoinHandle<()>)> {
        tokio::fs::create_dir_all(profile_dir).await
            .map_err(|e| WatchError::Setup(format!("Failed to create temp dir: {}", e)))?;

        let mut builder = BrowserConfig::builder()
            .headless_mode(if config.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(profile_dir);

        if let (Some(w), Some(h)) = (config.viewport_width, config.viewport_height) {
            builder = builder.window_size(w, h);
        }

        let chrome_cfg = builder.build()
            .map_err(|e| WatchError::Setup(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg).await
            .map_err(|e| WatchError::Setup(format!("Launch failed: {}", e)))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
        Ok((browser, handler))
    }

    /// Loads `url` and runs `callback` once the page stops changing.
    ///
    /// The browser is closed and its profile directory removed on every exit path.
    pub async fn load<F>(&self, url: &str, callback: F) -> Result<PageLoadResult>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let profile_dir = profile_dir();
        let (mut browser, handler) = match Self::launch(&self.launch_config, &profile_dir).await {
            Ok(launched) => launched,
            Err(e) => {
                remove_profile_dir(&profile_dir).await;
                return Err(e);
            }
        };
        let outcome = self.watch_page(&browser, url, callback).await;

        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        // Chromium keeps writing to the profile until the process exits
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Browser exit wait failed");
        }
        handler.abort();
        remove_profile_dir(&profile_dir).await;

        outcome.map(|report| PageLoadResult { url: url.to_string(), report })
    }

    async fn watch_page<F>(&self, browser: &Browser, url: &str, callback: F) -> Result<WatchReport>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let page = browser.new_page("about:blank").await
            .map_err(|e| WatchError::Setup(format!("New page failed: {}", e)))?;

        info!(url, "Navigating");
        match tokio::time::timeout(self.launch_config.navigation, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(WatchError::Setup(format!("Navigation failed: {}", e))),
            Err(_) => {
                return Err(WatchError::Setup(format!(
                    "Navigation did not finish within {}ms",
                    self.launch_config.navigation.as_millis()
                )));
            }
        }

        let document = Arc::new(ChromiumDocument::new(page));
        let watcher = LoadWatcher::new(document, self.watch_config.clone())
            .with_cancellation(self.cancel.clone());
        let report = watcher.watch_until_loaded(callback).await?;

        info!(url, ticks = report.ticks, strategy = ?report.strategy, "Page loaded");
        Ok(report)
    }
}

fn profile_dir() -> PathBuf {
    std::env::temp_dir().join(format!("chromium-{}", uuid::Uuid::new_v4()))
}

async fn remove_profile_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "Profile dir cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profile_dir_is_removed_with_contents() {
        let dir = profile_dir();
        tokio::fs::create_dir_all(dir.join("Default")).await.unwrap();
        tokio::fs::write(dir.join("Default").join("Preferences"), b"{}").await.unwrap();

        remove_profile_dir(&dir).await;
        assert!(!dir.exists());

        // already gone
        remove_profile_dir(&dir).await;
    }

    #[test]
    fn profile_dirs_are_unique() {
        assert_ne!(profile_dir(), profile_dir());
    }

    #[test]
    fn loader_token_is_a_child_of_the_caller_token() {
        let shutdown = CancellationToken::new();
        let loader = PageLoader::new().with_cancellation(shutdown.clone());

        loader.cancel.cancel();
        assert!(!shutdown.is_cancelled());

        let loader = PageLoader::new().with_cancellation(shutdown.clone());
        shutdown.cancel();
        assert!(loader.cancel.is_cancelled());
    }
}
