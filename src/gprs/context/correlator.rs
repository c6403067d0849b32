use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Failure, Result};
use crate::ril::{
    DeactivateDataCallRequest, EventSink, RilCodec, RilTransport, Serial, SetupDataCallRequest,
    request,
};

use super::address::Ipv4Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RequestKind {
    Activate,
    Deactivate,
}

/// Where the outcome of a request goes. A teardown without a responder is a
/// fire-and-forget shutdown.
#[derive(Debug)]
pub(super) enum Completion {
    Activate(oneshot::Sender<Result<Ipv4Settings>>),
    Deactivate(Option<oneshot::Sender<Result<()>>>),
}

impl Completion {
    pub(super) fn kind(&self) -> RequestKind {
        match self {
            Completion::Activate(_) => RequestKind::Activate,
            Completion::Deactivate(_) => RequestKind::Deactivate,
        }
    }

    /// Delivers an error to the caller; consumes the completion.
    pub(super) fn fail(self, error: Error) {
        match self {
            Completion::Activate(responder) => {
                let _ = responder.send(Err(error));
            }
            Completion::Deactivate(Some(responder)) => {
                let _ = responder.send(Err(error));
            }
            Completion::Deactivate(None) => {
                debug!(error = %error, "shutdown teardown finished with error");
            }
        }
    }
}

pub(super) enum OutgoingRequest {
    SetupDataCall(SetupDataCallRequest),
    DeactivateDataCall(DeactivateDataCallRequest),
}

impl OutgoingRequest {
    fn code(&self) -> u32 {
        match self {
            OutgoingRequest::SetupDataCall(_) => request::SETUP_DATA_CALL,
            OutgoingRequest::DeactivateDataCall(_) => request::DEACTIVATE_DATA_CALL,
        }
    }
}

#[derive(Debug)]
pub(super) struct PendingRequest {
    pub(super) serial: Serial,
    pub(super) context_id: Option<u32>,
    pub(super) completion: Completion,
    pub(super) deadline: Instant,
}

impl PendingRequest {
    pub(super) fn kind(&self) -> RequestKind {
        self.completion.kind()
    }
}

/// Issuance failed before anything was queued; the completion is handed back
/// so the caller can resolve it.
#[derive(Debug)]
pub(super) struct Rejected {
    pub(super) failure: Failure,
    pub(super) completion: Completion,
}

/// Pairs the single outstanding request of a context with its reply.
#[derive(Debug)]
pub(super) struct RequestCorrelator {
    pending: Option<PendingRequest>,
    timeout: Duration,
}

impl RequestCorrelator {
    pub(super) fn new(timeout: Duration) -> Self {
        Self {
            pending: None,
            timeout,
        }
    }

    pub(super) fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Encodes and queues `outgoing`, recording it as the pending request.
    pub(super) async fn issue<T, C>(
        &mut self,
        transport: &T,
        codec: &C,
        sink: &EventSink,
        outgoing: OutgoingRequest,
        context_id: Option<u32>,
        completion: Completion,
    ) -> std::result::Result<Serial, Rejected>
    where
        T: RilTransport + ?Sized,
        C: RilCodec + ?Sized,
    {
        if let Some(pending) = self.pending.as_ref() {
            warn!(serial = pending.serial, "request already outstanding");
            return Err(Rejected {
                failure: Failure::transport(),
                completion,
            });
        }

        let code = outgoing.code();
        let encoded = match &outgoing {
            OutgoingRequest::SetupDataCall(request) => codec.encode_setup_data_call(request),
            OutgoingRequest::DeactivateDataCall(request) => {
                codec.encode_deactivate_data_call(request)
            }
        };
        let payload = match encoded {
            Ok(payload) => payload,
            Err(err) => {
                warn!(request = request::name(code), error = %err, "could not build request");
                return Err(Rejected {
                    failure: Failure::validation(),
                    completion,
                });
            }
        };

        let serial = match transport.send(code, payload, sink.clone()).await {
            Ok(serial) => serial,
            Err(err) => {
                warn!(request = request::name(code), error = %err, "send failed");
                return Err(Rejected {
                    failure: Failure::transport(),
                    completion,
                });
            }
        };

        debug!(serial, request = request::name(code), "request queued");
        self.pending = Some(PendingRequest {
            serial,
            context_id,
            completion,
            deadline: Instant::now() + self.timeout,
        });
        Ok(serial)
    }

    /// Claims the pending request answered by `serial`. Unknown or already
    /// consumed serials yield `None`.
    pub(super) fn take(&mut self, serial: Serial) -> Option<PendingRequest> {
        match self.pending.as_ref() {
            Some(pending) if pending.serial == serial => self.pending.take(),
            _ => None,
        }
    }

    /// Claims the pending request if its deadline has passed.
    pub(super) fn take_expired(&mut self, now: Instant) -> Option<PendingRequest> {
        match self.pending.as_ref() {
            Some(pending) if pending.deadline <= now => self.pending.take(),
            _ => None,
        }
    }

    pub(super) fn drain(&mut self) -> Option<PendingRequest> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::FailureKind;
    use crate::ril::{
        AuthMode, DataCallList, DataProfile, DeactivateReason, LoopbackTransport, ParcelCodec,
        PdpProtocol, RadioTechnology, SetupDataCallReply,
    };

    fn setup(apn: &str) -> OutgoingRequest {
        OutgoingRequest::SetupDataCall(SetupDataCallRequest {
            technology: RadioTechnology::Hspa,
            data_profile: DataProfile::Default,
            apn: apn.into(),
            username: String::new(),
            password: String::new(),
            auth_mode: AuthMode::PapOrChap,
            protocol: PdpProtocol::Ip,
        })
    }

    struct BrokenCodec;

    impl RilCodec for BrokenCodec {
        fn encode_setup_data_call(&self, _: &SetupDataCallRequest) -> Result<Bytes> {
            Err(Error::codec("refusing to encode"))
        }

        fn decode_setup_data_call(&self, _: &[u8]) -> Result<SetupDataCallReply> {
            Err(Error::codec("refusing to decode"))
        }

        fn encode_deactivate_data_call(&self, _: &DeactivateDataCallRequest) -> Result<Bytes> {
            Err(Error::codec("refusing to encode"))
        }

        fn decode_data_call_list(&self, _: &[u8]) -> Result<DataCallList> {
            Err(Error::codec("refusing to decode"))
        }
    }

    #[tokio::test]
    async fn reply_is_consumed_exactly_once() {
        let transport = LoopbackTransport::new();
        let (sink, _events) = mpsc::unbounded_channel();
        let (tx, _rx) = oneshot::channel();
        let mut correlator = RequestCorrelator::new(Duration::from_secs(30));

        let serial = correlator
            .issue(
                &transport,
                &ParcelCodec,
                &sink,
                setup("internet"),
                Some(1),
                Completion::Activate(tx),
            )
            .await
            .expect("issued");
        assert!(correlator.is_busy());

        assert!(correlator.take(serial + 1).is_none());
        let pending = correlator.take(serial).expect("pending");
        assert_eq!(pending.kind(), RequestKind::Activate);
        assert_eq!(pending.context_id, Some(1));
        assert!(correlator.take(serial).is_none());
        assert!(!correlator.is_busy());
    }

    #[tokio::test]
    async fn encode_failure_hands_completion_back() {
        let transport = LoopbackTransport::new();
        let (sink, _events) = mpsc::unbounded_channel();
        let (tx, _rx) = oneshot::channel();
        let mut correlator = RequestCorrelator::new(Duration::from_secs(30));

        let rejected = correlator
            .issue(
                &transport,
                &BrokenCodec,
                &sink,
                OutgoingRequest::DeactivateDataCall(DeactivateDataCallRequest {
                    call_id: 3,
                    reason: DeactivateReason::NoReason,
                }),
                None,
                Completion::Deactivate(Some(tx)),
            )
            .await
            .expect_err("encode fails");
        assert_eq!(rejected.failure.kind, FailureKind::Validation);
        assert_eq!(rejected.completion.kind(), RequestKind::Deactivate);
        assert!(!correlator.is_busy());
        assert!(transport.history().await.is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_a_transport_failure() {
        let transport = LoopbackTransport::new();
        transport.reject_sends(true).await;
        let (sink, _events) = mpsc::unbounded_channel();
        let (tx, _rx) = oneshot::channel();
        let mut correlator = RequestCorrelator::new(Duration::from_secs(30));

        let rejected = correlator
            .issue(
                &transport,
                &ParcelCodec,
                &sink,
                setup("internet"),
                Some(1),
                Completion::Activate(tx),
            )
            .await
            .expect_err("send fails");
        assert_eq!(rejected.failure.kind, FailureKind::Transport);
        assert!(!correlator.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_request_expires_at_deadline() {
        let transport = LoopbackTransport::new();
        let (sink, _events) = mpsc::unbounded_channel();
        let (tx, _rx) = oneshot::channel();
        let mut correlator = RequestCorrelator::new(Duration::from_secs(5));

        correlator
            .issue(
                &transport,
                &ParcelCodec,
                &sink,
                setup("internet"),
                Some(1),
                Completion::Activate(tx),
            )
            .await
            .expect("issued");

        assert!(correlator.take_expired(Instant::now()).is_none());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(correlator.take_expired(Instant::now()).is_some());
        assert!(correlator.deadline().is_none());
    }
}
