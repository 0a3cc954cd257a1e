//! Integration tests for the event handler.
//!
//! These tests start a real listener, send actual HTTP requests and verify
//! what subscribers and brokers observe.

use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_handler::{
    async_trait, BrokerRequest, BrokerResponse, EventHandler, EventHandlerConfig, EventKind,
    EventMessage, EventMessagePtr, EventSubscriber, RequestBroker,
};

/// Subscriber collecting everything it receives.
#[derive(Default)]
struct Collector {
    messages: Mutex<Vec<EventMessagePtr>>,
}

impl Collector {
    fn messages(&self) -> Vec<EventMessagePtr> {
        self.messages.lock().unwrap().clone()
    }
}

impl EventSubscriber for Collector {
    fn handle_event_message(&self, msg: EventMessagePtr) {
        self.messages.lock().unwrap().push(msg);
    }
}

/// Broker serving stream metadata under `/stream`.
struct StreamBroker;

#[async_trait]
impl RequestBroker for StreamBroker {
    fn name(&self) -> &str {
        "stream"
    }

    async fn process(&self, request: &BrokerRequest) -> BrokerResponse {
        let body = format!("{} {}?{}", request.method, request.path, request.query);
        BrokerResponse::content("text/plain", body)
    }
}

fn local_handler(port: u16) -> EventHandler {
    EventHandler::with_config(
        EventHandlerConfig::new()
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_binding_port(port)
            .with_worker_threads(2)
            .with_shutdown_timeout(Duration::from_millis(200)),
    )
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("Failed to build HTTP client")
}

fn notify_method() -> reqwest::Method {
    reqwest::Method::from_bytes(b"NOTIFY").unwrap()
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_notification_end_to_end() {
    let handler = local_handler(0);
    assert!(handler.start());

    let collector = Arc::new(Collector::default());
    let id = handler.create_subscription(Arc::downgrade(&collector));
    assert!(handler.subscribe_for_event(id, EventKind::PropertyChange));

    let event_xml = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
    <e:property>
        <Volume>42</Volume>
    </e:property>
</e:propertyset>"#;

    let url = format!("http://127.0.0.1:{}/notify/rendering", handler.port());
    let response = client()
        .request(notify_method(), &url)
        .header("SID", "uuid:RINCON_000E58A0123401400_sub0000000001")
        .header("NT", "upnp:event")
        .header("NTS", "upnp:propchange")
        .header("SEQ", "7")
        .header("Content-Type", "text/xml")
        .body(event_xml)
        .send()
        .await
        .expect("Failed to send NOTIFY");
    assert_eq!(response.status(), 200);

    // dispatch completes before the device gets its answer
    let messages = collector.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind(), EventKind::PropertyChange);
    assert_eq!(
        messages[0].subject_at(0),
        Some("uuid:RINCON_000E58A0123401400_sub0000000001")
    );
    assert_eq!(messages[0].subject_at(1), Some("7"));
    assert!(messages[0].subject_at(2).unwrap().contains("<Volume>42</Volume>"));

    handler.stop();
}

#[tokio::test]
async fn test_notification_without_nt_headers() {
    let handler = local_handler(0);
    assert!(handler.start());

    let collector = Arc::new(Collector::default());
    let id = handler.create_subscription(Arc::downgrade(&collector));
    handler.subscribe_for_event(id, EventKind::PropertyChange);

    let url = format!("http://127.0.0.1:{}/", handler.port());
    let response = client()
        .request(notify_method(), &url)
        .header("SID", "uuid:sub-2")
        .body("<e:propertyset/>")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(collector.messages().len(), 1);
    assert_eq!(collector.messages()[0].subject_at(1), Some(""));

    handler.stop();
}

#[tokio::test]
async fn test_kind_filtering_over_http() {
    let handler = local_handler(0);
    assert!(handler.start());

    let properties = Arc::new(Collector::default());
    let streams = Arc::new(Collector::default());
    let id1 = handler.create_subscription(Arc::downgrade(&properties));
    let id2 = handler.create_subscription(Arc::downgrade(&streams));
    handler.subscribe_for_event(id1, EventKind::PropertyChange);
    handler.subscribe_for_event(id2, EventKind::HttpStream);

    let url = format!("http://127.0.0.1:{}/", handler.port());
    client()
        .request(notify_method(), &url)
        .header("SID", "uuid:sub-3")
        .send()
        .await
        .unwrap();

    assert_eq!(properties.messages().len(), 1);
    assert!(streams.messages().is_empty());

    handler.stop();
}

#[tokio::test]
async fn test_broker_routing_and_rejection() {
    let handler = local_handler(0);
    assert!(handler.start());
    handler.register_request_broker(Arc::new(StreamBroker));

    let base = format!("http://127.0.0.1:{}", handler.port());
    let http = client();

    let response = http
        .get(format!("{base}/stream/metadata?track=3"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain"
    );
    assert_eq!(
        response.text().await.unwrap(),
        "GET /stream/metadata?track=3"
    );

    let response = http.get(format!("{base}/unknown")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let response = http
        .request(notify_method(), format!("{base}/stream"))
        .header("SID", "uuid:sub-4")
        .header("NT", "upnp:event")
        .header("NTS", "ssdp:alive")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 412);

    handler.unregister_request_broker("stream");
    let response = http
        .get(format!("{base}/stream/metadata"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    handler.stop();
}

#[tokio::test]
async fn test_revoked_subscriber_gets_nothing_over_http() {
    let handler = local_handler(0);
    assert!(handler.start());

    let collector = Arc::new(Collector::default());
    let id = handler.create_subscription(Arc::downgrade(&collector));
    handler.subscribe_for_event(id, EventKind::PropertyChange);
    handler.revoke_subscription(id);

    let url = format!("http://127.0.0.1:{}/", handler.port());
    let response = client()
        .request(notify_method(), &url)
        .header("SID", "uuid:sub-5")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(collector.messages().is_empty());

    handler.stop();
}

#[test]
fn test_scenario_on_fixed_port() {
    let port = free_port();
    let handler = local_handler(port);

    assert!(handler.start());
    assert_eq!(handler.port(), port);

    let subscriber = Arc::new(Collector::default());
    let id = handler.create_subscription(Arc::downgrade(&subscriber));
    assert_eq!(id, 1);
    assert!(handler.subscribe_for_event(id, EventKind::PropertyChange));

    let msg = EventMessage::new(EventKind::PropertyChange, ["volume", "42"]).into_ptr();
    handler.dispatch_event(&msg);

    let messages = subscriber.messages();
    assert_eq!(messages.len(), 1);
    assert!(Arc::ptr_eq(&messages[0], &msg));

    handler.stop();
}

#[test]
fn test_stopped_port_is_free_for_new_engine() {
    let first = local_handler(0);
    assert!(first.start());
    let port = first.port();

    first.stop();
    assert!(!first.is_running());

    let second = local_handler(port);
    assert!(second.start());
    assert!(second.is_running());
    second.stop();
}

#[tokio::test]
async fn test_no_requests_served_after_stop() {
    let handler = local_handler(0);
    assert!(handler.start());
    let url = format!("http://127.0.0.1:{}/", handler.port());
    handler.stop();

    let result = client()
        .request(notify_method(), &url)
        .header("SID", "uuid:sub-6")
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_stop_with_keep_alive_client_connected() {
    let handler = local_handler(0);
    assert!(handler.start());
    let base = format!("http://127.0.0.1:{}", handler.port());

    // the pooled connection stays open after the response
    let http = client();
    let response = http.get(format!("{base}/unknown")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let stopped = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::task::spawn_blocking(move || {
            handler.stop();
            handler.is_running()
        }),
    )
    .await;

    let still_running = stopped.expect("stop() did not return").unwrap();
    assert!(!still_running);
    assert!(http.get(format!("{base}/unknown")).send().await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_notifications_with_subscription_churn() {
    const NOTIFICATIONS: usize = 20;

    let handler = Arc::new(local_handler(0));
    assert!(handler.start());

    let collector = Arc::new(Collector::default());
    let id = handler.create_subscription(&collector);
    handler.subscribe_for_event(id, EventKind::PropertyChange);

    let churn = {
        let handler = handler.clone();
        std::thread::spawn(move || {
            let transient = Arc::new(Collector::default());
            for _ in 0..200 {
                let id = handler.create_subscription(&transient);
                assert!(handler.subscribe_for_event(id, EventKind::PropertyChange));
                handler.revoke_subscription(id);
            }
        })
    };

    let url = format!("http://127.0.0.1:{}/", handler.port());
    let http = client();
    let requests: Vec<_> = (0..NOTIFICATIONS)
        .map(|i| {
            let request = http
                .request(notify_method(), &url)
                .header("SID", format!("uuid:sub-{i}"))
                .header("SEQ", i.to_string());
            tokio::spawn(async move { request.send().await.map(|r| r.status()) })
        })
        .collect();

    for request in requests {
        assert_eq!(request.await.unwrap().unwrap(), 200);
    }
    churn.join().unwrap();

    let mut sids: Vec<String> = collector
        .messages()
        .iter()
        .filter_map(|m| m.subject_at(0).map(str::to_string))
        .collect();
    sids.sort();
    sids.dedup();
    assert_eq!(sids.len(), NOTIFICATIONS);

    handler.stop();
}
