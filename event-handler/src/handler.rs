//! Null-safe façade over an engine.
//!
//! [`EventHandler`] holds at most one [`EventHandlerThread`] and forwards
//! every call to it. Without an engine each operation returns `false`, `0`,
//! an empty string or an empty list and does nothing, so callers never have
//! to check whether the engine exists.

use crate::broker::RequestBrokerPtr;
use crate::config::EventHandlerConfig;
use crate::message::{EventKind, EventMessagePtr};
use crate::server::WarpEventHandlerThread;
use crate::subscription::{IntoSubscriber, SubscriptionId, NO_SUBSCRIPTION};
use crate::thread::{EventHandlerThread, HandlerState};

/// Façade over an optional event handler engine.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use event_handler::{EventHandler, EventKind, EventMessagePtr, EventSubscriber};
///
/// struct Volume;
///
/// impl EventSubscriber for Volume {
///     fn handle_event_message(&self, msg: EventMessagePtr) {
///         println!("{:?}", msg.subject());
///     }
/// }
///
/// let handler = EventHandler::with_port(3400);
/// if !handler.start() {
///     eprintln!("listener unavailable, events disabled");
/// }
///
/// let volume = Arc::new(Volume);
/// let id = handler.create_subscription(Arc::downgrade(&volume));
/// handler.subscribe_for_event(id, EventKind::PropertyChange);
/// ```
pub struct EventHandler {
    imp: Option<Box<dyn EventHandlerThread>>,
}

impl EventHandler {
    /// Façade over a warp engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EventHandlerConfig::default())
    }

    /// Façade over a warp engine bound to `port`.
    pub fn with_port(port: u16) -> Self {
        Self::with_config(EventHandlerConfig::default().with_binding_port(port))
    }

    /// Façade over a warp engine built from `config`.
    pub fn with_config(config: EventHandlerConfig) -> Self {
        Self::from_thread(Box::new(WarpEventHandlerThread::new(config)))
    }

    /// Façade over any engine implementation.
    pub fn from_thread(imp: Box<dyn EventHandlerThread>) -> Self {
        Self { imp: Some(imp) }
    }

    /// Façade without engine: every call is a no-op returning a default.
    pub fn detached() -> Self {
        Self { imp: None }
    }

    /// Whether an engine is attached.
    pub fn has_engine(&self) -> bool {
        self.imp.is_some()
    }

    /// Bind and launch the listener. Blocks until the bind outcome is known.
    pub fn start(&self) -> bool {
        self.imp.as_ref().is_some_and(|imp| imp.start())
    }

    /// Halt the listener and release the port before returning.
    pub fn stop(&self) {
        if let Some(imp) = &self.imp {
            imp.stop();
        }
    }

    /// Address devices should send notifications to, empty when detached.
    pub fn address(&self) -> String {
        self.imp.as_ref().map(|imp| imp.address()).unwrap_or_default()
    }

    /// Listener port, `0` when detached.
    pub fn port(&self) -> u16 {
        self.imp.as_ref().map_or(0, |imp| imp.port())
    }

    /// Whether the listener is serving.
    pub fn is_running(&self) -> bool {
        self.imp.as_ref().is_some_and(|imp| imp.is_running())
    }

    /// Engine state; a detached façade reports [`HandlerState::Stopped`].
    pub fn state(&self) -> HandlerState {
        self.imp.as_ref().map(|imp| imp.state()).unwrap_or_default()
    }

    /// Register a broker for non-event requests.
    pub fn register_request_broker(&self, broker: RequestBrokerPtr) {
        if let Some(imp) = &self.imp {
            imp.register_request_broker(broker);
        }
    }

    /// Remove the broker named `name`.
    pub fn unregister_request_broker(&self, name: &str) {
        if let Some(imp) = &self.imp {
            imp.unregister_request_broker(name);
        }
    }

    /// Broker registered under `name`.
    pub fn get_request_broker(&self, name: &str) -> Option<RequestBrokerPtr> {
        self.imp.as_ref().and_then(|imp| imp.get_request_broker(name))
    }

    /// All registered brokers.
    pub fn all_request_brokers(&self) -> Vec<RequestBrokerPtr> {
        self.imp
            .as_ref()
            .map(|imp| imp.all_request_brokers())
            .unwrap_or_default()
    }

    /// Register a subscriber with an empty kind set.
    ///
    /// Accepts `Arc::downgrade(&subscriber)` or `&subscriber`. Returns `0`
    /// when detached or when the subscriber is already dropped.
    pub fn create_subscription(&self, subscriber: impl IntoSubscriber) -> SubscriptionId {
        self.imp.as_ref().map_or(NO_SUBSCRIPTION, |imp| {
            imp.create_subscription(subscriber.into_subscriber())
        })
    }

    /// Add `kind` to a subscription. Returns `false` for unknown ids.
    pub fn subscribe_for_event(&self, id: SubscriptionId, kind: EventKind) -> bool {
        self.imp
            .as_ref()
            .is_some_and(|imp| imp.subscribe_for_event(id, kind))
    }

    /// Remove a subscription.
    pub fn revoke_subscription(&self, id: SubscriptionId) {
        if let Some(imp) = &self.imp {
            imp.revoke_subscription(id);
        }
    }

    /// Remove every subscription owned by `subscriber`.
    pub fn revoke_all_subscriptions(&self, subscriber: impl IntoSubscriber) {
        if let Some(imp) = &self.imp {
            imp.revoke_all_subscriptions(subscriber.into_subscriber());
        }
    }

    /// Deliver `msg` to every matching subscriber, oldest subscription first.
    pub fn dispatch_event(&self, msg: &EventMessagePtr) {
        if let Some(imp) = &self.imp {
            imp.dispatch_event(msg);
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
