//! Listener registration and synchronous fan-out of service events.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use serde::{Deserialize, Serialize};
use shared::types::ServiceInfo;
use uuid::Uuid;

/// The two events a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceEvent {
    /// A service not previously known was announced by a peer
    ServiceAnnounced,

    /// A known service was renounced by a peer
    ServiceRenounced,
}

impl ServiceEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceEvent::ServiceAnnounced => "serviceAnnounced",
            ServiceEvent::ServiceRenounced => "serviceRenounced",
        }
    }
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    fn generate() -> Self {
        SubscriptionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listener callback. Runs on the instance task, so it must not block on
/// the instance handle.
pub type Callback = Box<dyn Fn(&ServiceInfo) + Send + Sync + 'static>;

#[derive(Default)]
pub struct Dispatcher {
    announced: Vec<(SubscriptionId, Callback)>,
    renounced: Vec<(SubscriptionId, Callback)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self, event: ServiceEvent) -> &Vec<(SubscriptionId, Callback)> {
        match event {
            ServiceEvent::ServiceAnnounced => &self.announced,
            ServiceEvent::ServiceRenounced => &self.renounced,
        }
    }

    fn listeners_mut(&mut self, event: ServiceEvent) -> &mut Vec<(SubscriptionId, Callback)> {
        match event {
            ServiceEvent::ServiceAnnounced => &mut self.announced,
            ServiceEvent::ServiceRenounced => &mut self.renounced,
        }
    }

    pub fn subscribe(&mut self, event: ServiceEvent, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.listeners_mut(event).push((id.clone(), callback));
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, event: ServiceEvent, id: &SubscriptionId) -> bool {
        let listeners = self.listeners_mut(event);
        match listeners.iter().position(|(existing, _)| existing == id) {
            Some(index) => {
                drop(listeners.remove(index));
                true
            }
            None => false,
        }
    }

    /// Call every listener for `event` in subscription order. A panicking
    /// listener is logged and skipped.
    pub fn dispatch(&self, event: ServiceEvent, info: &ServiceInfo) {
        for (id, callback) in self.listeners(event) {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(info))).is_err() {
                tracing::warn!("Listener {} for {} panicked", id, event);
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("announced", &self.announced.len())
            .field("renounced", &self.renounced.len())
            .finish()
    }
}
