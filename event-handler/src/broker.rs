//! Request brokers for HTTP traffic outside the event protocol.
//!
//! The listener owns a single port. Requests that are not event
//! notifications are offered to the registered brokers, which may claim them
//! (for example a broker serving streamed media metadata under `/stream`).

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use warp::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use warp::http::{HeaderMap, Method, Response, StatusCode};

/// An inbound HTTP request as seen by the router and the brokers.
#[derive(Debug, Clone)]
pub struct BrokerRequest {
    /// HTTP method, including extension methods such as `NOTIFY`
    pub method: Method,
    /// Request path, always starting with `/`
    pub path: String,
    /// Raw query string without the leading `?`, empty if none
    pub query: String,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Address of the remote peer, when known
    pub remote_addr: Option<SocketAddr>,
}

impl BrokerRequest {
    /// Create a request with an empty query, no headers and an empty body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
        }
    }

    /// Set the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Replace all headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the remote peer address.
    pub fn with_remote_addr(mut self, remote_addr: Option<SocketAddr>) -> Self {
        self.remote_addr = remote_addr;
        self
    }

    /// Value of header `name` if present and valid UTF-8 (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Non-empty path segments, in order.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }
}

/// Response produced by a broker, or by the router itself.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

impl BrokerResponse {
    /// Response with the given status and an empty body.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Empty `200 OK`.
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// `404 Not Found`, used for unroutable requests.
    pub fn not_found() -> Self {
        Self::with_status(StatusCode::NOT_FOUND)
    }

    /// `200 OK` with a body of the given content type.
    pub fn content(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::ok()
            .with_header(CONTENT_TYPE.as_str(), content_type)
            .with_body(body)
    }

    /// Plain-text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_status(status)
            .with_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into an HTTP response. Headers that are not valid HTTP are dropped.
    pub fn into_http(self) -> Response<Bytes> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

/// Named handler for HTTP requests outside the event protocol.
///
/// Brokers are looked up and invoked by the engine only, never by
/// subscribers.
#[async_trait]
pub trait RequestBroker: Send + Sync {
    /// Registry key of this broker.
    fn name(&self) -> &str;

    /// Whether this broker claims `request`.
    ///
    /// The default rule claims requests whose first path segment equals the
    /// broker name, so a broker named `stream` serves `/stream/...`.
    fn accepts(&self, request: &BrokerRequest) -> bool {
        request.path_segments().next() == Some(self.name())
    }

    /// Produce the response for a claimed request.
    async fn process(&self, request: &BrokerRequest) -> BrokerResponse;
}

/// Shared handle to a registered broker.
pub type RequestBrokerPtr = Arc<dyn RequestBroker>;

/// Registry of request brokers keyed by name.
///
/// Iteration, and therefore routing precedence, follows name order.
pub struct BrokerRegistry {
    brokers: RwLock<BTreeMap<String, RequestBrokerPtr>>,
}

impl BrokerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            brokers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a broker under its name, replacing any broker of that name.
    pub fn register(&self, broker: RequestBrokerPtr) {
        let name = broker.name().to_string();
        if self.brokers.write().insert(name.clone(), broker).is_some() {
            tracing::debug!(broker = %name, "Request broker replaced");
        } else {
            tracing::debug!(broker = %name, "Request broker registered");
        }
    }

    /// Remove the broker named `name`. No-op if absent.
    pub fn unregister(&self, name: &str) {
        if self.brokers.write().remove(name).is_some() {
            tracing::debug!(broker = %name, "Request broker unregistered");
        }
    }

    /// Broker registered under `name`.
    pub fn get(&self, name: &str) -> Option<RequestBrokerPtr> {
        self.brokers.read().get(name).cloned()
    }

    /// All registered brokers, in name order.
    pub fn all(&self) -> Vec<RequestBrokerPtr> {
        self.brokers.read().values().cloned().collect()
    }

    /// First broker, in name order, claiming `request`.
    ///
    /// The lock is released before the broker is returned, so processing
    /// never runs under it.
    pub fn find(&self, request: &BrokerRequest) -> Option<RequestBrokerPtr> {
        self.brokers
            .read()
            .values()
            .find(|broker| broker.accepts(request))
            .cloned()
    }

    /// Number of registered brokers.
    pub fn len(&self) -> usize {
        self.brokers.read().len()
    }

    /// Whether no broker is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
