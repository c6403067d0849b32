//! In-process transport that hands requests to a simulated modem.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::{Error, Result};

use super::message::{RilError, Serial, request};
use super::transport::{
    EventSink, RegistrationId, RilEvent, RilReply, RilTransport, UnsolicitedMessage,
};

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub serial: Serial,
    pub code: u32,
    pub payload: Bytes,
}

#[derive(Debug, Default)]
struct LoopbackState {
    next_serial: Serial,
    next_registration: RegistrationId,
    reject_sends: bool,
    outbox: VecDeque<SentRequest>,
    history: Vec<SentRequest>,
    awaiting_reply: HashMap<Serial, EventSink>,
    listeners: HashMap<RegistrationId, (u32, EventSink)>,
    released: Vec<RegistrationId>,
}

/// Transport whose far end is driven by the owner: requests queue up until
/// [`LoopbackTransport::next_request`] picks them, replies and unsolicited
/// messages are injected by hand.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    wake: Notify,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail as if the daemon socket were gone.
    pub async fn reject_sends(&self, reject: bool) {
        self.state.lock().await.reject_sends = reject;
    }

    /// Waits for the next request queued by a context.
    pub async fn next_request(&self) -> SentRequest {
        loop {
            let notified = self.wake.notified();
            if let Some(request) = self.state.lock().await.outbox.pop_front() {
                return request;
            }
            notified.await;
        }
    }

    /// Every request sent so far, oldest first.
    pub async fn history(&self) -> Vec<SentRequest> {
        self.state.lock().await.history.clone()
    }

    pub async fn reply(&self, serial: Serial, error: RilError, payload: Bytes) -> Result<()> {
        let sink = self
            .state
            .lock()
            .await
            .awaiting_reply
            .remove(&serial)
            .ok_or_else(|| Error::transport(format!("no request with serial {serial}")))?;

        sink.send(RilEvent::Reply(RilReply {
            serial,
            error,
            payload,
        }))
        .map_err(|_| Error::transport("reply receiver dropped"))
    }

    /// Broadcasts an unsolicited message, returning how many listeners got it.
    pub async fn unsolicited(&self, code: u32, payload: Bytes) -> usize {
        let guard = self.state.lock().await;
        let mut delivered = 0;
        for (listener_code, sink) in guard.listeners.values() {
            if *listener_code != code {
                continue;
            }
            let message = UnsolicitedMessage {
                code,
                payload: payload.clone(),
            };
            if sink.send(RilEvent::Unsolicited(message)).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn listener_count(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    pub async fn released_registrations(&self) -> Vec<RegistrationId> {
        self.state.lock().await.released.clone()
    }
}

#[async_trait]
impl RilTransport for LoopbackTransport {
    async fn send(&self, code: u32, payload: Bytes, replies: EventSink) -> Result<Serial> {
        let mut guard = self.state.lock().await;
        if guard.reject_sends {
            return Err(Error::transport(format!(
                "{} rejected by transport",
                request::name(code)
            )));
        }

        guard.next_serial = guard.next_serial.wrapping_add(1).max(1);
        let serial = guard.next_serial;
        let sent = SentRequest {
            serial,
            code,
            payload,
        };
        debug!(serial, request = request::name(code), "loopback request queued");
        guard.outbox.push_back(sent.clone());
        guard.history.push(sent);
        guard.awaiting_reply.insert(serial, replies);
        drop(guard);

        self.wake.notify_one();
        Ok(serial)
    }

    async fn register(&self, code: u32, sink: EventSink) -> Result<RegistrationId> {
        let mut guard = self.state.lock().await;
        guard.next_registration += 1;
        let id = guard.next_registration;
        guard.listeners.insert(id, (code, sink));
        Ok(id)
    }

    async fn unregister(&self, id: RegistrationId) -> Result<()> {
        let mut guard = self.state.lock().await;
        if guard.listeners.remove(&id).is_none() {
            return Err(Error::transport(format!("registration {id} is not active")));
        }
        guard.released.push(id);
        Ok(())
    }
}
