use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EventBindingCalled, EventExecutionContextsCleared, RemoveBindingParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use settle_core::{Document, MutationFeed, MutationSender, Result, WatchError, mutation_channel};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::shared::{js, to_watch_error};

#[derive(Debug, Deserialize)]
struct InstallState {
    installed: bool,
}

struct Subscription {
    binding: String,
    forwarder: JoinHandle<()>,
}

/// A Chromium page observed through CDP
pub struct ChromiumDocument {
    page: Page,
    subscription: Mutex<Option<Subscription>>,
}

impl ChromiumDocument {
    pub fn new(page: Page) -> Self {
        Self { page, subscription: Mutex::new(None) }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn remove_binding(&self, binding: &str) {
        let js = js::build_js_call(js::dom::DISCONNECT_CHANGE_OBSERVER, &[json!(binding)]);
        if let Err(e) = self.page.evaluate(js).await {
            debug!(error = %e, binding, "Page observer already gone");
        }
        if let Err(e) = self.page.execute(RemoveBindingParams::new(binding)).await {
            debug!(error = %e, binding, "Binding removal failed");
        }
    }
}

/// Forwards binding calls into the feed until the page context is replaced
/// or the subscriber goes away.
async fn forward_notifications(
    mut calls: EventStream<EventBindingCalled>,
    mut cleared: EventStream<EventExecutionContextsCleared>,
    binding: String,
    sender: MutationSender,
) {
    loop {
        tokio::select! {
            Some(call) = calls.next() => {
                if call.name != binding {
                    continue;
                }
                match call.payload.parse::<u64>() {
                    Ok(count) => {
                        if !sender.notify(count) {
                            break;
                        }
                    }
                    Err(_) => debug!(payload = %call.payload, "Ignoring malformed change notification"),
                }
            }
            Some(_) = cleared.next() => {
                debug!("Page context replaced, closing change feed");
                break;
            }
            else => break,
        }
    }
}

#[async_trait]
impl Document for ChromiumDocument {
    async fn element_count(&self) -> Result<u64> {
        let js = js::build_js_call(js::dom::COUNT_ELEMENTS, &[]);
        let result = self.page.evaluate(js).await
            .map_err(|e| to_watch_error(e, "CountElements"))?;
        result.into_value::<u64>()
            .map_err(|e| WatchError::document(format!("CountElements returned no count: {}", e)))
    }

    async fn subscribe(&self) -> Result<Option<MutationFeed>> {
        if self.subscription.lock().is_some() {
            return Err(WatchError::document("page already has an active change subscription"));
        }

        let calls = self.page.event_listener::<EventBindingCalled>().await
            .map_err(|e| to_watch_error(e, "ListenBindings"))?;
        let cleared = self.page.event_listener::<EventExecutionContextsCleared>().await
            .map_err(|e| to_watch_error(e, "ListenContexts"))?;

        let binding = format!("__settle_notify_{}", uuid::Uuid::new_v4().simple());
        self.page.execute(AddBindingParams::new(binding.clone())).await
            .map_err(|e| to_watch_error(e, "AddBinding"))?;

        let (sender, feed) = mutation_channel();
        let forwarder = tokio::spawn(forward_notifications(calls, cleared, binding.clone(), sender));

        let js = js::build_js_call(js::dom::INSTALL_CHANGE_OBSERVER, &[json!(binding)]);
        let installed = match self.page.evaluate(js).await {
            Ok(result) => result.into_value::<InstallState>().map(|s| s.installed).unwrap_or(false),
            Err(e) => {
                forwarder.abort();
                self.remove_binding(&binding).await;
                return Err(to_watch_error(e, "InstallObserver"));
            }
        };

        if !installed {
            forwarder.abort();
            self.remove_binding(&binding).await;
            return Ok(None);
        }

        debug!(binding = %binding, "Page change observer installed");
        *self.subscription.lock() = Some(Subscription { binding, forwarder });
        Ok(Some(feed))
    }

    async fn unsubscribe(&self) -> Result<()> {
        let subscription = self.subscription.lock().take();
        if let Some(Subscription { binding, forwarder }) = subscription {
            forwarder.abort();
            self.remove_binding(&binding).await;
        }
        Ok(())
    }
}
