use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::AbortHandle;

use crate::util::Id;

pub type SubscriptionId = Id<Subscription>;

/// Delivery tasks of every open subscription, by id
pub(crate) type Registry = Arc<DashMap<SubscriptionId, AbortHandle>>;

/// A handle to an open room subscription.
///
/// Delivery stops when the handle is dropped or [Subscription::unsubscribe] is called.
#[must_use = "dropping a subscription cancels it"]
pub struct Subscription {
    id: SubscriptionId,
    handle: AbortHandle,
    registry: Registry,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, handle: AbortHandle, registry: Registry) -> Self {
        Self {
            id,
            handle,
            registry,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true until the subscription is cancelled or its room stream has ended
    pub fn is_active(&self) -> bool {
        self.registry.contains_key(&self.id)
    }

    /// Stops delivery of further updates
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        self.registry.remove(&self.id);
    }
}
