//! Detection of UPnP event notifications among inbound requests.
//!
//! A notification is a `NOTIFY` request carrying a `SID` header. Everything
//! else is left to the request brokers. Parsing of the property set in the
//! body is up to the subscribers.

use crate::broker::BrokerRequest;
use crate::message::{EventKind, EventMessage};

/// HTTP method used by devices to push events.
pub const NOTIFY_METHOD: &str = "NOTIFY";

/// Expected `NT` header value.
pub const NT_EVENT: &str = "upnp:event";

/// Expected `NTS` header value.
pub const NTS_PROPCHANGE: &str = "upnp:propchange";

/// A validated event notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Subscription id from the `SID` header
    pub sid: String,
    /// Event sequence number from the `SEQ` header
    pub seq: Option<String>,
    /// Raw event body, decoded lossily as UTF-8
    pub body: String,
}

impl Notification {
    /// Translate into a `PropertyChange` message with subject `[SID, SEQ, body]`.
    ///
    /// A missing `SEQ` is rendered as an empty string so the body always sits
    /// at index 2.
    pub fn into_message(self) -> EventMessage {
        EventMessage::new(
            EventKind::PropertyChange,
            [self.sid, self.seq.unwrap_or_default(), self.body],
        )
    }
}

/// Outcome of inspecting an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// A valid event notification
    Notification(Notification),
    /// Looks like a notification but the envelope headers are wrong
    Malformed(&'static str),
    /// Not an event notification at all
    Other,
}

/// Inspect `request` for the notification envelope.
pub fn classify(request: &BrokerRequest) -> Envelope {
    if request.method.as_str() != NOTIFY_METHOD {
        return Envelope::Other;
    }

    let Some(sid) = request.header("sid") else {
        return Envelope::Other;
    };

    if !validate_headers(request.header("nt"), request.header("nts")) {
        return Envelope::Malformed("unexpected NT/NTS headers");
    }

    Envelope::Notification(Notification {
        sid: sid.to_string(),
        seq: request.header("seq").map(str::to_string),
        body: String::from_utf8_lossy(&request.body).into_owned(),
    })
}

/// `NT` and `NTS` are optional, but when both are present they must carry
/// the UPnP eventing values.
fn validate_headers(nt: Option<&str>, nts: Option<&str>) -> bool {
    match (nt, nts) {
        (Some(nt), Some(nts)) => nt == NT_EVENT && nts == NTS_PROPCHANGE,
        _ => true,
    }
}
