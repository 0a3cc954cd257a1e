//! Routing of inbound HTTP requests.
//!
//! The [`EventRouter`] owns both registries. Every inbound request is first
//! checked for the event notification envelope; notifications are dispatched
//! to subscribers, anything else is offered to the request brokers, and
//! requests nobody claims are answered `404 Not Found`.

use std::sync::Arc;

use warp::http::StatusCode;

use crate::broker::{BrokerRegistry, BrokerRequest, BrokerResponse, RequestBrokerPtr};
use crate::message::{EventKind, EventMessagePtr};
use crate::notification::{self, Envelope};
use crate::subscription::{IntoSubscriber, SubscriptionId, SubscriptionRegistry};

/// Subscription and broker registries plus the two-tier request routing.
pub struct EventRouter {
    subscriptions: SubscriptionRegistry,
    brokers: BrokerRegistry,
}

impl EventRouter {
    /// Create a router with empty registries.
    pub fn new() -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(),
            brokers: BrokerRegistry::new(),
        }
    }

    /// Subscription registry
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Request broker registry
    pub fn brokers(&self) -> &BrokerRegistry {
        &self.brokers
    }

    /// Register a subscriber with an empty kind set. Returns `0` on failure.
    pub fn create_subscription(&self, subscriber: impl IntoSubscriber) -> SubscriptionId {
        self.subscriptions.create(subscriber)
    }

    /// Add `kind` to a subscription. Returns `false` for unknown ids.
    pub fn subscribe_for_event(&self, id: SubscriptionId, kind: EventKind) -> bool {
        self.subscriptions.subscribe(id, kind)
    }

    /// Remove a subscription. No-op for unknown ids.
    pub fn revoke_subscription(&self, id: SubscriptionId) {
        self.subscriptions.revoke(id)
    }

    /// Remove every subscription owned by `subscriber`.
    pub fn revoke_all_subscriptions(&self, subscriber: impl IntoSubscriber) {
        self.subscriptions.revoke_all(subscriber)
    }

    /// Deliver `msg` to every matching subscriber. See [`SubscriptionRegistry::dispatch`].
    pub fn dispatch(&self, msg: &EventMessagePtr) -> usize {
        self.subscriptions.dispatch(msg)
    }

    /// Register a broker, replacing one with the same name.
    pub fn register_request_broker(&self, broker: RequestBrokerPtr) {
        self.brokers.register(broker)
    }

    /// Remove the broker named `name`, if any.
    pub fn unregister_request_broker(&self, name: &str) {
        self.brokers.unregister(name)
    }

    /// Broker registered under `name`.
    pub fn get_request_broker(&self, name: &str) -> Option<RequestBrokerPtr> {
        self.brokers.get(name)
    }

    /// All brokers, in name order.
    pub fn all_request_brokers(&self) -> Vec<RequestBrokerPtr> {
        self.brokers.all()
    }

    /// Route one inbound request and produce its response.
    ///
    /// Notifications are answered only after dispatch has returned, so a
    /// device never sees `200 OK` for an event nobody has been handed yet.
    pub async fn route(&self, request: BrokerRequest) -> BrokerResponse {
        match notification::classify(&request) {
            Envelope::Notification(notification) => {
                tracing::debug!(
                    sid = %notification.sid,
                    path = %request.path,
                    body_len = request.body.len(),
                    "Event notification received"
                );
                let msg = Arc::new(notification.into_message());
                let delivered = self.dispatch(&msg);
                tracing::trace!(delivered, "Notification dispatched");
                BrokerResponse::ok()
            }
            Envelope::Malformed(reason) => {
                tracing::warn!(path = %request.path, reason, "Rejecting malformed notification");
                BrokerResponse::text(StatusCode::PRECONDITION_FAILED, reason)
            }
            Envelope::Other => match self.brokers.find(&request) {
                Some(broker) => {
                    tracing::debug!(
                        broker = broker.name(),
                        method = %request.method,
                        path = %request.path,
                        "Delegating request to broker"
                    );
                    broker.process(&request).await
                }
                None => {
                    tracing::debug!(method = %request.method, path = %request.path, "No route for request");
                    BrokerResponse::not_found()
                }
            },
        }
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
