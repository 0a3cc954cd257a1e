//! The engine contract.
//!
//! An [`EventHandlerThread`] owns one listener, the subscription registry and
//! the request broker registry. Several backing implementations are possible;
//! [`WarpEventHandlerThread`](crate::WarpEventHandlerThread) is the one
//! shipped here.

use std::fmt;
use std::sync::Weak;

use crate::broker::RequestBrokerPtr;
use crate::message::{EventKind, EventMessagePtr};
use crate::subscription::{EventSubscriber, SubscriptionId};

/// Lifecycle state of an engine.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`, with `Failed`
/// reachable from `Starting` (bind failure) or `Running` (serve loop died).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandlerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerState::Stopped => "stopped",
            HandlerState::Starting => "starting",
            HandlerState::Running => "running",
            HandlerState::Stopping => "stopping",
            HandlerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Engine owning the listener, the registries and dispatch.
///
/// All operations are callable concurrently from application threads and
/// from subscriber callbacks running on the listener, except `start()` and
/// `stop()`, which must not be called from inside a subscriber callback.
///
/// Subscriber handles are type-erased to keep the trait object safe. Bind
/// the weak handle first (`let weak: Weak<S> = Arc::downgrade(&subscriber)`)
/// or convert with [`IntoSubscriber`](crate::IntoSubscriber); the
/// [`EventHandler`](crate::EventHandler) façade accepts concrete handles
/// directly.
pub trait EventHandlerThread: Send + Sync {
    /// Address devices should send notifications to.
    fn address(&self) -> String;

    /// Port of the listener. Reports the bound port once started.
    fn port(&self) -> u16;

    /// Bind and launch the listener. Blocks until the bind has succeeded or
    /// failed. Returns `false` if already running or on failure.
    fn start(&self) -> bool;

    /// Halt the listener and release the port before returning. Safe from
    /// any state.
    fn stop(&self);

    /// `true` only while in [`HandlerState::Running`].
    fn is_running(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> HandlerState;

    /// Register a subscriber with an empty kind set. Returns `0` on failure.
    fn create_subscription(&self, subscriber: Weak<dyn EventSubscriber>) -> SubscriptionId;

    /// Add `kind` to a subscription. Returns `false` for unknown ids.
    fn subscribe_for_event(&self, id: SubscriptionId, kind: EventKind) -> bool;

    /// Remove a subscription. No-op for unknown ids.
    fn revoke_subscription(&self, id: SubscriptionId);

    /// Remove every subscription owned by `subscriber`.
    fn revoke_all_subscriptions(&self, subscriber: Weak<dyn EventSubscriber>);

    /// Deliver `msg` to every subscription registered for its kind, oldest first.
    fn dispatch_event(&self, msg: &EventMessagePtr);

    /// Register a broker for non-event requests, replacing one of the same name.
    fn register_request_broker(&self, broker: RequestBrokerPtr);

    /// Remove the broker named `name`.
    fn unregister_request_broker(&self, name: &str);

    /// Broker registered under `name`.
    fn get_request_broker(&self, name: &str) -> Option<RequestBrokerPtr>;

    /// All registered brokers.
    fn all_request_brokers(&self) -> Vec<RequestBrokerPtr>;
}
