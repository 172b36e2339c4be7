//! Runs against a locally installed Chromium: `cargo test -p settle_browser -- --ignored`

use settle_browser::{LaunchConfig, PageLoader};
use settle_core::{StrategyKind, WatchConfig, WatchError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const STATIC_PAGE: &str = "data:text/html,<html><body><h1>settled</h1><p>nothing moves here</p></body></html>";

const TICKING_PAGE: &str = "data:text/html,<html><body><ul id='feed'></ul><script>\
setInterval(() => document.getElementById('feed').appendChild(document.createElement('li')), 100);\
</script></body></html>";

#[tokio::test]
#[ignore = "requires a local Chromium"]
async fn static_page_settles_via_mutation_observer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = PageLoader::with_config(LaunchConfig::default(), WatchConfig::fast());

    let result = loader
        .load(STATIC_PAGE, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(result.report.strategy, StrategyKind::Mutation);
    assert_eq!(result.report.ticks, 3);
    assert_eq!(result.report.final_element_count, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore = "requires a local Chromium"]
async fn constantly_growing_page_times_out() {
    let config = WatchConfig::fast().with_max_intervals(5);
    let loader = PageLoader::with_config(LaunchConfig::default(), config);

    let err = loader.load(TICKING_PAGE, || Ok(())).await.unwrap_err();
    assert!(matches!(err, WatchError::Timeout { intervals: 6, .. }));
}
