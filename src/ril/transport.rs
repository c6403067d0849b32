use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;

use super::message::{RilError, Serial};

/// Reply to a solicited request, tagged with the serial returned by
/// [`RilTransport::send`].
#[derive(Debug, Clone)]
pub struct RilReply {
    pub serial: Serial,
    pub error: RilError,
    pub payload: Bytes,
}

#[derive(Debug, Clone)]
pub struct UnsolicitedMessage {
    pub code: u32,
    pub payload: Bytes,
}

/// Inbound traffic for one context, in transport delivery order.
#[derive(Debug, Clone)]
pub enum RilEvent {
    Reply(RilReply),
    Unsolicited(UnsolicitedMessage),
}

pub type EventSink = mpsc::UnboundedSender<RilEvent>;

pub type RegistrationId = u32;

/// Request/reply and unsolicited event plumbing towards the RIL daemon.
#[async_trait]
pub trait RilTransport: Send + Sync + 'static {
    /// Queues a request. The reply is later pushed into `replies` carrying the
    /// returned serial.
    async fn send(&self, code: u32, payload: Bytes, replies: EventSink) -> Result<Serial>;

    /// Subscribes `sink` to unsolicited messages with the given code.
    async fn register(&self, code: u32, sink: EventSink) -> Result<RegistrationId>;

    async fn unregister(&self, id: RegistrationId) -> Result<()>;
}
