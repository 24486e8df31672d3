//! Per-domain live event streams
//!
//! An in-memory pub/sub registry keyed by base-domain. Publishing is
//! fire-and-forget over a bounded broadcast channel: a slow watcher lags and
//! drops the oldest events instead of back-pressuring the serving path, and
//! a missing watcher costs one map lookup.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::dns::requests::RequestEvent;

/// Buffered events per base-domain channel before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 256;

/// Registry of live subscriptions, keyed by base-domain.
#[derive(Default)]
pub struct RequestStream {
    channels: Mutex<HashMap<String, broadcast::Sender<RequestEvent>>>,
}

impl RequestStream {
    pub fn new() -> RequestStream {
        RequestStream::default()
    }

    /// Subscribe to future events for `base_domain`. The subscription lasts
    /// as long as the returned receiver; nothing is persisted.
    pub fn subscribe(&self, base_domain: &str) -> broadcast::Receiver<RequestEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(base_domain.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver an event to every watcher of `base_domain`.
    ///
    /// Never blocks and never fails: send errors mean nobody is listening,
    /// and channels whose last receiver is gone are pruned here.
    pub fn publish(&self, base_domain: &str, event: RequestEvent) {
        let mut channels = self.channels.lock();
        if let Some(sender) = channels.get(base_domain) {
            if sender.receiver_count() == 0 {
                channels.remove(base_domain);
                return;
            }
            let _ = sender.send(event);
        }
    }

    /// Watchers currently registered for `base_domain`.
    pub fn subscriber_count(&self, base_domain: &str) -> usize {
        self.channels
            .lock()
            .get(base_domain)
            .map_or(0, |sender| sender.receiver_count())
    }
}
