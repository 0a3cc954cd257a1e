//! Subscription registry and type-filtered dispatch.
//!
//! Subscribers are held weakly: the registry never keeps a subscriber alive.
//! Subscriptions whose owner has been dropped are pruned on the next dispatch
//! that would have reached them, so a forgotten revoke never delivers into a
//! dead object.

use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::message::{EventKind, EventMessagePtr};

/// Identifier of a subscription. `0` means "not subscribed".
pub type SubscriptionId = u32;

/// Reserved id returned when no subscription could be created.
pub const NO_SUBSCRIPTION: SubscriptionId = 0;

/// Anything able to receive dispatched events.
///
/// Implementations are called synchronously from the dispatching context,
/// possibly the listener's worker thread. They must not block indefinitely,
/// since a slow subscriber delays delivery to every subscriber after it.
pub trait EventSubscriber: Send + Sync {
    /// Handle one dispatched message.
    fn handle_event_message(&self, msg: EventMessagePtr);
}

/// Conversion into the weak subscriber handle stored by the registry.
///
/// Implemented for `Weak<S>` and `&Arc<S>` of any concrete subscriber, and
/// for the type-erased `Weak<dyn EventSubscriber>` / `&Arc<dyn EventSubscriber>`,
/// so callers can pass `Arc::downgrade(&subscriber)` or `&subscriber` directly.
pub trait IntoSubscriber {
    /// Weak, type-erased handle to the subscriber.
    fn into_subscriber(self) -> Weak<dyn EventSubscriber>;
}

impl<S: EventSubscriber + 'static> IntoSubscriber for Weak<S> {
    fn into_subscriber(self) -> Weak<dyn EventSubscriber> {
        self
    }
}

impl IntoSubscriber for Weak<dyn EventSubscriber> {
    fn into_subscriber(self) -> Weak<dyn EventSubscriber> {
        self
    }
}

impl<S: EventSubscriber + 'static> IntoSubscriber for &Arc<S> {
    fn into_subscriber(self) -> Weak<dyn EventSubscriber> {
        let weak: Weak<S> = Arc::downgrade(self);
        weak
    }
}

impl IntoSubscriber for &Arc<dyn EventSubscriber> {
    fn into_subscriber(self) -> Weak<dyn EventSubscriber> {
        Arc::downgrade(self)
    }
}

struct Subscription {
    owner: Weak<dyn EventSubscriber>,
    kinds: HashSet<EventKind>,
}

impl Subscription {
    fn is_owned_by(&self, owner: &Weak<dyn EventSubscriber>) -> bool {
        std::ptr::addr_eq(self.owner.as_ptr(), owner.as_ptr())
    }
}

struct Inner {
    next_id: SubscriptionId,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

/// Registry of subscriptions keyed by id.
///
/// Ids come from a monotonic counter starting at 1 and are never reused for
/// the lifetime of the registry.
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                subscriptions: BTreeMap::new(),
            }),
        }
    }

    /// Register `subscriber` with an empty kind set.
    ///
    /// Returns [`NO_SUBSCRIPTION`] if the subscriber is already gone or the
    /// id space is exhausted.
    pub fn create(&self, subscriber: impl IntoSubscriber) -> SubscriptionId {
        let subscriber = subscriber.into_subscriber();
        if subscriber.strong_count() == 0 {
            tracing::debug!("Refusing subscription for a dropped subscriber");
            return NO_SUBSCRIPTION;
        }

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        let Some(next) = id.checked_add(1) else {
            tracing::error!("Subscription id space exhausted");
            return NO_SUBSCRIPTION;
        };
        inner.next_id = next;
        inner.subscriptions.insert(
            id,
            Subscription {
                owner: subscriber,
                kinds: HashSet::new(),
            },
        );

        tracing::debug!(subscription_id = id, "Subscription created");
        id
    }

    /// Add `kind` to the subscription's kind set.
    ///
    /// Returns `false` if `id` is unknown. Subscribing twice is harmless.
    pub fn subscribe(&self, id: SubscriptionId, kind: EventKind) -> bool {
        let mut inner = self.inner.lock();
        match inner.subscriptions.get_mut(&id) {
            Some(subscription) => {
                subscription.kinds.insert(kind);
                tracing::debug!(subscription_id = id, %kind, "Subscribed for event");
                true
            }
            None => {
                tracing::debug!(subscription_id = id, %kind, "Unknown subscription");
                false
            }
        }
    }

    /// Remove one subscription. Unknown ids are ignored.
    pub fn revoke(&self, id: SubscriptionId) {
        if self.inner.lock().subscriptions.remove(&id).is_some() {
            tracing::debug!(subscription_id = id, "Subscription revoked");
        }
    }

    /// Remove every subscription owned by `subscriber`.
    ///
    /// Ownership is decided by identity, so this works even after the
    /// subscriber has been dropped.
    pub fn revoke_all(&self, subscriber: impl IntoSubscriber) {
        let subscriber = subscriber.into_subscriber();
        let mut inner = self.inner.lock();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|_, s| !s.is_owned_by(&subscriber));
        let removed = before - inner.subscriptions.len();
        if removed > 0 {
            tracing::debug!(removed, "Revoked all subscriptions of subscriber");
        }
    }

    /// Whether `id` is a live subscription.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.lock().subscriptions.contains_key(&id)
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Whether the registry holds no subscription.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `msg` to every subscription registered for its kind.
    ///
    /// Delivery happens in ascending id order, without holding the registry
    /// lock, so callbacks may create or revoke subscriptions. A panicking
    /// subscriber is logged and skipped. Returns the number of subscribers
    /// the message was handed to.
    pub fn dispatch(&self, msg: &EventMessagePtr) -> usize {
        let kind = msg.kind();
        let targets = self.snapshot(kind);

        let mut delivered = 0;
        for (id, subscriber) in targets {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                subscriber.handle_event_message(Arc::clone(msg));
            }));
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(subscription_id = id, %kind, "Subscriber panicked while handling event");
                }
            }
        }

        tracing::trace!(%kind, delivered, "Event dispatched");
        delivered
    }

    fn snapshot(&self, kind: EventKind) -> Vec<(SubscriptionId, Arc<dyn EventSubscriber>)> {
        let mut inner = self.inner.lock();
        let mut targets = Vec::new();
        let mut dropped = Vec::new();

        for (id, subscription) in inner.subscriptions.iter() {
            if !subscription.kinds.contains(&kind) {
                continue;
            }
            match subscription.owner.upgrade() {
                Some(subscriber) => targets.push((*id, subscriber)),
                None => dropped.push(*id),
            }
        }

        for id in dropped {
            inner.subscriptions.remove(&id);
            tracing::debug!(subscription_id = id, "Pruned subscription of dropped subscriber");
        }

        targets
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod property_tests {
    use super::tests::Recorder;
    use super::*;
    use crate::message::EventMessage;
    use proptest::prelude::*;

    fn arb_kind() -> impl Strategy<Value = EventKind> {
        prop::sample::select(EventKind::ALL.to_vec())
    }

    proptest! {
        /// Ids handed out by one registry are unique and never zero.
        #[test]
        fn test_ids_unique_and_nonzero(count in 1usize..200) {
            let registry = SubscriptionRegistry::new();
            let sub = Arc::new(Recorder::default());
            let mut seen = HashSet::new();

            for _ in 0..count {
                let id = registry.create(Arc::downgrade(&sub));
                prop_assert_ne!(id, NO_SUBSCRIPTION);
                prop_assert!(seen.insert(id));
            }
        }

        /// Dispatching kind K reaches exactly the subscriptions holding K.
        #[test]
        fn test_dispatch_reaches_matching_subscriptions(
            kind_sets in prop::collection::vec(prop::collection::vec(arb_kind(), 0..4), 1..12),
            dispatched in arb_kind(),
        ) {
            let registry = SubscriptionRegistry::new();
            let subscribers: Vec<Arc<Recorder>> =
                kind_sets.iter().map(|_| Arc::new(Recorder::default())).collect();

            for (sub, kinds) in subscribers.iter().zip(&kind_sets) {
                let id = registry.create(Arc::downgrade(sub));
                for kind in kinds {
                    registry.subscribe(id, *kind);
                }
            }

            let expected = kind_sets.iter().filter(|k| k.contains(&dispatched)).count();
            let delivered = registry.dispatch(&EventMessage::new(dispatched, ["x"]).into_ptr());
            prop_assert_eq!(delivered, expected);

            for (sub, kinds) in subscribers.iter().zip(&kind_sets) {
                let want = usize::from(kinds.contains(&dispatched));
                prop_assert_eq!(sub.count(), want);
            }
        }
    }
}
