//! Embedded event-notification hub.
//!
//! This crate runs a small HTTP listener that receives UPnP event
//! notifications pushed by speakers and fans them out to in-process
//! subscribers according to event kind. Other HTTP requests arriving on the
//! same port are handed to pluggable request brokers.
//!
//! # Overview
//!
//! - [`EventHandler`]: the façade applications hold. It owns at most one
//!   engine and degrades to harmless defaults without one.
//! - [`EventHandlerThread`]: the engine contract; [`WarpEventHandlerThread`]
//!   implements it with warp on a background thread.
//! - [`EventSubscriber`]: receives [`EventMessage`]s for the kinds it
//!   subscribed to.
//! - [`RequestBroker`]: serves requests that are not event notifications.
//!
//! # Routing
//!
//! 1. `NOTIFY` requests carrying a `SID` header become `PropertyChange`
//!    messages with subject `[SID, SEQ, body]` and are dispatched.
//! 2. Anything else goes to the first broker (in name order) that accepts it.
//! 3. Requests nobody claims are answered `404 Not Found`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_handler::{EventHandler, EventKind, EventMessagePtr, EventSubscriber};
//!
//! struct Logger;
//!
//! impl EventSubscriber for Logger {
//!     fn handle_event_message(&self, msg: EventMessagePtr) {
//!         println!("{} {:?}", msg.kind(), msg.subject());
//!     }
//! }
//!
//! let handler = EventHandler::with_port(3400);
//! assert!(handler.start());
//!
//! let logger = Arc::new(Logger);
//! let id = handler.create_subscription(Arc::downgrade(&logger));
//! handler.subscribe_for_event(id, EventKind::PropertyChange);
//! handler.subscribe_for_event(id, EventKind::HandlerStatus);
//!
//! // ... speakers push events to http://<address>:3400 ...
//!
//! handler.revoke_all_subscriptions(Arc::downgrade(&logger));
//! handler.stop();
//! ```

pub mod broker;
pub mod config;
pub mod error;
mod handler;
pub mod logging;
pub mod message;
pub mod notification;
pub mod router;
mod server;
pub mod subscription;
mod thread;

pub use async_trait::async_trait;
pub use broker::{BrokerRegistry, BrokerRequest, BrokerResponse, RequestBroker, RequestBrokerPtr};
pub use config::EventHandlerConfig;
pub use error::EventHandlerError;
pub use handler::EventHandler;
pub use message::{
    EventKind, EventMessage, EventMessagePtr, STATUS_FAILED, STATUS_STARTED, STATUS_STOPPED,
};
pub use router::EventRouter;
pub use server::WarpEventHandlerThread;
pub use subscription::{
    EventSubscriber, IntoSubscriber, SubscriptionId, SubscriptionRegistry, NO_SUBSCRIPTION,
};
pub use thread::{EventHandlerThread, HandlerState};
