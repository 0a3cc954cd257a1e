//! Warp-backed engine.
//!
//! [`WarpEventHandlerThread`] runs the HTTP listener on a dedicated thread
//! that owns its own tokio runtime, and exposes a blocking API to the rest
//! of the application. Every request the listener accepts goes through the
//! shared [`EventRouter`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::Filter;

use crate::broker::{BrokerRequest, RequestBrokerPtr};
use crate::config::EventHandlerConfig;
use crate::error::{EventHandlerError, Result};
use crate::message::{EventKind, EventMessage, EventMessagePtr, STATUS_FAILED, STATUS_STARTED, STATUS_STOPPED};
use crate::router::EventRouter;
use crate::subscription::{EventSubscriber, SubscriptionId};
use crate::thread::{EventHandlerThread, HandlerState};

/// State shared between the engine and its listener thread.
struct Shared {
    state: RwLock<HandlerState>,
    port: AtomicU16,
    router: Arc<EventRouter>,
}

impl Shared {
    fn state(&self) -> HandlerState {
        *self.state.read()
    }

    fn set_state(&self, state: HandlerState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Event handler state changed");
        }
    }

    /// Dispatch a `HandlerStatus` message.
    fn announce(&self, subject: Vec<String>) {
        self.router.dispatch(&EventMessage::status(subject).into_ptr());
    }
}

/// A launched listener thread.
struct Listener {
    shutdown_tx: oneshot::Sender<()>,
    stopping: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Event handler engine serving HTTP with warp.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use event_handler::{
///     EventHandlerConfig, EventHandlerThread, EventKind, EventMessagePtr, EventSubscriber,
///     WarpEventHandlerThread,
/// };
///
/// struct Printer;
///
/// impl EventSubscriber for Printer {
///     fn handle_event_message(&self, msg: EventMessagePtr) {
///         println!("{}: {:?}", msg.kind(), msg.subject());
///     }
/// }
///
/// let engine = WarpEventHandlerThread::new(EventHandlerConfig::new().with_binding_port(3400));
/// assert!(engine.start());
///
/// let printer: Arc<dyn EventSubscriber> = Arc::new(Printer);
/// let id = engine.create_subscription(Arc::downgrade(&printer));
/// engine.subscribe_for_event(id, EventKind::PropertyChange);
///
/// println!("Send notifications to {}", engine.base_url());
/// # engine.stop();
/// ```
pub struct WarpEventHandlerThread {
    config: EventHandlerConfig,
    listener_address: String,
    shared: Arc<Shared>,
    listener: Mutex<Option<Listener>>,
}

impl WarpEventHandlerThread {
    /// Create a stopped engine. Nothing is bound until [`start`](EventHandlerThread::start).
    pub fn new(config: EventHandlerConfig) -> Self {
        let listener_address = config.resolve_listener_address().to_string();
        let shared = Arc::new(Shared {
            state: RwLock::new(HandlerState::Stopped),
            port: AtomicU16::new(config.binding_port),
            router: Arc::new(EventRouter::new()),
        });

        Self {
            config,
            listener_address,
            shared,
            listener: Mutex::new(None),
        }
    }

    /// Create a stopped engine with default configuration bound to `port`.
    pub fn with_port(port: u16) -> Self {
        Self::new(EventHandlerConfig::default().with_binding_port(port))
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EventHandlerConfig {
        &self.config
    }

    /// Router holding the subscription and broker registries
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.shared.router
    }

    /// Callback URL to hand to devices, `http://<address>:<port>`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.listener_address, self.port())
    }

    fn spawn_listener(&self) -> Result<Listener> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stopping = Arc::new(AtomicBool::new(false));

        let addr = SocketAddr::new(self.config.bind_address, self.config.binding_port);
        let worker_threads = self.config.worker_threads.max(1);
        let shutdown_timeout = self.config.shutdown_timeout;
        let shared = self.shared.clone();
        let worker_stopping = stopping.clone();

        let handle = thread::Builder::new()
            .name("event-handler".to_string())
            .spawn(move || {
                run_listener(
                    shared,
                    addr,
                    worker_threads,
                    shutdown_timeout,
                    ready_tx,
                    shutdown_rx,
                    worker_stopping,
                )
            })
            .map_err(|e| EventHandlerError::Worker(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(_)) => Ok(Listener {
                shutdown_tx,
                stopping,
                handle,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(EventHandlerError::Worker(
                    "listener thread exited before binding".to_string(),
                ))
            }
        }
    }
}

impl EventHandlerThread for WarpEventHandlerThread {
    fn address(&self) -> String {
        self.listener_address.clone()
    }

    fn port(&self) -> u16 {
        self.shared.port.load(Ordering::SeqCst)
    }

    fn start(&self) -> bool {
        let mut listener = self.listener.lock();

        if let Some(current) = listener.take() {
            if !current.handle.is_finished() {
                tracing::warn!(state = %self.shared.state(), "Event handler already running");
                *listener = Some(current);
                return false;
            }
            // serve loop died on its own, reap the thread before rebinding
            let _ = current.handle.join();
        }

        self.shared.set_state(HandlerState::Starting);
        match self.spawn_listener() {
            Ok(started) => {
                *listener = Some(started);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Event handler failed to start");
                self.shared.set_state(HandlerState::Failed);
                drop(listener);
                self.shared.announce(vec![STATUS_FAILED.to_string(), e.to_string()]);
                false
            }
        }
    }

    fn stop(&self) {
        let mut listener = self.listener.lock();

        let Some(current) = listener.take() else {
            if self.shared.state() == HandlerState::Failed {
                self.shared.set_state(HandlerState::Stopped);
            }
            return;
        };

        self.shared.set_state(HandlerState::Stopping);
        current.stopping.store(true, Ordering::SeqCst);
        let _ = current.shutdown_tx.send(());
        if current.handle.join().is_err() {
            tracing::error!("Event handler listener thread panicked");
        }
        drop(listener);

        self.shared.set_state(HandlerState::Stopped);
        tracing::info!(port = self.port(), "Event handler stopped");
        self.shared.announce(vec![STATUS_STOPPED.to_string()]);
    }

    fn is_running(&self) -> bool {
        self.shared.state() == HandlerState::Running
    }

    fn state(&self) -> HandlerState {
        self.shared.state()
    }

    fn create_subscription(&self, subscriber: Weak<dyn EventSubscriber>) -> SubscriptionId {
        self.shared.router.create_subscription(subscriber)
    }

    fn subscribe_for_event(&self, id: SubscriptionId, kind: EventKind) -> bool {
        self.shared.router.subscribe_for_event(id, kind)
    }

    fn revoke_subscription(&self, id: SubscriptionId) {
        self.shared.router.revoke_subscription(id)
    }

    fn revoke_all_subscriptions(&self, subscriber: Weak<dyn EventSubscriber>) {
        self.shared.router.revoke_all_subscriptions(subscriber)
    }

    fn dispatch_event(&self, msg: &EventMessagePtr) {
        self.shared.router.dispatch(msg);
    }

    fn register_request_broker(&self, broker: RequestBrokerPtr) {
        self.shared.router.register_request_broker(broker)
    }

    fn unregister_request_broker(&self, name: &str) {
        self.shared.router.unregister_request_broker(name)
    }

    fn get_request_broker(&self, name: &str) -> Option<RequestBrokerPtr> {
        self.shared.router.get_request_broker(name)
    }

    fn all_request_brokers(&self) -> Vec<RequestBrokerPtr> {
        self.shared.router.all_request_brokers()
    }
}

impl Drop for WarpEventHandlerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the listener thread.
///
/// Reports the bind outcome on `ready_tx`, then serves until `shutdown_rx`
/// fires. Open connections get `shutdown_timeout` to finish; the runtime is
/// then dropped, which aborts the remaining connection tasks and releases
/// the port.
fn run_listener(
    shared: Arc<Shared>,
    addr: SocketAddr,
    worker_threads: usize,
    shutdown_timeout: Duration,
    ready_tx: mpsc::Sender<Result<SocketAddr>>,
    shutdown_rx: oneshot::Receiver<()>,
    stopping: Arc<AtomicBool>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name("event-handler-worker")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(EventHandlerError::Runtime(e)));
            return;
        }
    };

    let serve_shared = shared.clone();
    let served = runtime.block_on(async move {
        let routes = routes(serve_shared.router.clone());
        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let signal = async move {
            let _ = shutdown_rx.await;
            let _ = draining_tx.send(());
        };

        let (bound, server) = match warp::serve(routes).try_bind_with_graceful_shutdown(addr, signal) {
            Ok(bound) => bound,
            Err(e) => {
                let _ = ready_tx.send(Err(EventHandlerError::Bind {
                    addr,
                    reason: e.to_string(),
                }));
                return false;
            }
        };

        serve_shared.port.store(bound.port(), Ordering::SeqCst);
        serve_shared.set_state(HandlerState::Running);
        tracing::info!(%bound, "Event handler listening");
        serve_shared.announce(vec![STATUS_STARTED.to_string()]);
        let _ = ready_tx.send(Ok(bound));

        tokio::pin!(server);
        tokio::select! {
            _ = &mut server => return true,
            _ = draining_rx => {}
        }

        // idle keep-alive or half-sent requests would hold the drain open forever
        if tokio::time::timeout(shutdown_timeout, server).await.is_err() {
            tracing::warn!(
                timeout_ms = shutdown_timeout.as_millis() as u64,
                "Closing connections still open after shutdown timeout"
            );
        }
        true
    });
    drop(runtime);

    if served && !stopping.load(Ordering::SeqCst) {
        tracing::error!("Event handler serve loop terminated unexpectedly");
        shared.set_state(HandlerState::Failed);
        shared.announce(vec![
            STATUS_FAILED.to_string(),
            "serve loop terminated".to_string(),
        ]);
    }
}

/// Catch-all route handing every request to the router.
fn routes(
    router: Arc<EventRouter>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + Send + Sync + 'static {
    warp::method()
        .and(warp::path::full())
        .and(warp::query::raw().or(warp::any().map(String::new)).unify())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(warp::body::bytes())
        .and_then(
            move |method: Method,
                  path: FullPath,
                  query: String,
                  headers: HeaderMap,
                  remote: Option<SocketAddr>,
                  body: Bytes| {
                let router = router.clone();
                async move {
                    let request = BrokerRequest::new(method, path.as_str())
                        .with_query(query)
                        .with_headers(headers)
                        .with_body(body)
                        .with_remote_addr(remote);
                    Ok::<_, warp::Rejection>(router.route(request).await.into_http())
                }
            },
        )
        .recover(handle_rejection)
}

/// Turn rejections raised before routing (unreadable body, ...) into responses.
async fn handle_rejection(err: warp::Rejection) -> std::result::Result<impl warp::Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else {
        tracing::debug!(?err, "Request rejected before routing");
        (StatusCode::BAD_REQUEST, "Bad request")
    };

    Ok(warp::reply::with_status(message, code))
}
