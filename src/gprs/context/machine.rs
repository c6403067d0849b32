use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ContextConfig;
use crate::error::{Error, Failure, Result};
use crate::gprs::netreg::{RegistrationStatusProvider, RoamingGuard};
use crate::ril::{
    DeactivateDataCallRequest, DeactivateReason, EventSink, PdpProtocol, RilCodec, RilEvent,
    RilReply, RilTransport, SetupDataCallRequest, unsolicited,
};

use super::address::{self, Ipv4Settings};
use super::correlator::{Completion, OutgoingRequest, RequestCorrelator};
use super::reconciler::{Reconciliation, reconcile};
use super::state::{ContextData, ContextNotification, ContextState};

/// Parameters of a primary context activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateRequest {
    pub context_id: u32,
    pub apn: String,
    pub username: String,
    pub password: String,
    pub protocol: PdpProtocol,
}

impl ActivateRequest {
    pub fn new(context_id: u32, apn: impl Into<String>) -> Self {
        Self {
            context_id,
            apn: apn.into(),
            username: String::new(),
            password: String::new(),
            protocol: PdpProtocol::default(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_protocol(mut self, protocol: PdpProtocol) -> Self {
        self.protocol = protocol;
        self
    }
}

pub(super) enum Command {
    Activate {
        request: ActivateRequest,
        responder: oneshot::Sender<Result<Ipv4Settings>>,
    },
    Deactivate {
        context_id: u32,
        responder: oneshot::Sender<Result<()>>,
    },
    ShutdownNow {
        context_id: u32,
    },
}

/// Lifecycle state machine of one GPRS context.
///
/// Only this type mutates [`ContextData`]. Commands, replies, unsolicited
/// call lists and deadlines are fed in one at a time by the context task.
pub(super) struct GprsContext<T, C, R> {
    config: Arc<ContextConfig>,
    transport: Arc<T>,
    codec: Arc<C>,
    netreg: Arc<R>,
    roaming: RoamingGuard,
    data: ContextData,
    correlator: RequestCorrelator,
    events: EventSink,
    notifications: broadcast::Sender<ContextNotification>,
    state_tx: watch::Sender<ContextState>,
}

impl<T, C, R> GprsContext<T, C, R>
where
    T: RilTransport,
    C: RilCodec,
    R: RegistrationStatusProvider,
{
    pub(super) fn new(
        config: Arc<ContextConfig>,
        transport: Arc<T>,
        codec: Arc<C>,
        netreg: Arc<R>,
        events: EventSink,
        notifications: broadcast::Sender<ContextNotification>,
        state_tx: watch::Sender<ContextState>,
    ) -> Self {
        Self {
            roaming: RoamingGuard::new(config.roaming),
            correlator: RequestCorrelator::new(config.timers.request_timeout()),
            config,
            transport,
            codec,
            netreg,
            data: ContextData::default(),
            events,
            notifications,
            state_tx,
        }
    }

    pub(super) fn state(&self) -> ContextState {
        self.data.state()
    }

    pub(super) fn next_deadline(&self) -> Option<Instant> {
        self.correlator.deadline()
    }

    pub(super) async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Activate { request, responder } => self.activate(request, responder).await,
            Command::Deactivate {
                context_id,
                responder,
            } => self.deactivate(context_id, Some(responder)).await,
            Command::ShutdownNow { context_id } => self.shutdown_now(context_id).await,
        }
    }

    pub(super) async fn activate(
        &mut self,
        request: ActivateRequest,
        responder: oneshot::Sender<Result<Ipv4Settings>>,
    ) {
        info!(context_id = request.context_id, apn = %request.apn, "activating context");

        let state = self.data.state();
        if state != ContextState::Idle || self.correlator.is_busy() {
            warn!(%state, "activation requested while context is busy");
            let _ = responder.send(Err(Error::InvalidState {
                operation: "activate",
                state,
            }));
            return;
        }

        if let Err(failure) = self.roaming.check(self.netreg.as_ref()) {
            let _ = responder.send(Err(failure.into()));
            return;
        }

        let radio = self.config.radio;
        let setup = SetupDataCallRequest {
            technology: radio.technology,
            data_profile: radio.data_profile,
            apn: request.apn,
            username: request.username,
            password: request.password,
            auth_mode: radio.auth_mode,
            protocol: request.protocol,
        };

        self.data.begin_enabling(request.context_id);
        self.publish_state();

        let issued = self
            .correlator
            .issue(
                self.transport.as_ref(),
                self.codec.as_ref(),
                &self.events,
                OutgoingRequest::SetupDataCall(setup),
                Some(request.context_id),
                Completion::Activate(responder),
            )
            .await;

        if let Err(rejected) = issued {
            error!(failure = %rejected.failure, "send SETUP_DATA_CALL failed");
            self.set_disconnected();
            rejected.completion.fail(rejected.failure.into());
        }
    }

    pub(super) async fn deactivate(
        &mut self,
        context_id: u32,
        responder: Option<oneshot::Sender<Result<()>>>,
    ) {
        info!(context_id, "deactivating context");

        let state = self.data.state();
        let call_id = match (state, self.data.call_id()) {
            (ContextState::Active, Some(call_id)) => call_id,
            (ContextState::Idle, _) | (ContextState::Active, None) => {
                debug!(context_id, "no data call attached");
                self.set_disconnected();
                respond_deactivate(responder, Ok(()));
                return;
            }
            (ContextState::Enabling | ContextState::Disabling, _) => {
                warn!(%state, "deactivation requested while a request is outstanding");
                respond_deactivate(
                    responder,
                    Err(Error::InvalidState {
                        operation: "deactivate",
                        state,
                    }),
                );
                return;
            }
        };

        let active_context = self.data.context_id();
        if active_context != Some(context_id) {
            warn!(
                requested = context_id,
                active = ?active_context,
                "deactivating context under a different id"
            );
        }

        self.data.begin_disabling();
        self.publish_state();

        let teardown = DeactivateDataCallRequest {
            call_id,
            reason: DeactivateReason::NoReason,
        };
        let issued = self
            .correlator
            .issue(
                self.transport.as_ref(),
                self.codec.as_ref(),
                &self.events,
                OutgoingRequest::DeactivateDataCall(teardown),
                active_context,
                Completion::Deactivate(responder),
            )
            .await;

        if let Err(rejected) = issued {
            error!(call_id, failure = %rejected.failure, "send DEACTIVATE_DATA_CALL failed");
            self.set_disconnected();
            rejected.completion.fail(rejected.failure.into());
        }
    }

    /// Tears the attached call down without reporting back to anyone.
    pub(super) async fn shutdown_now(&mut self, context_id: u32) {
        debug!(context_id, "shutdown teardown requested");
        match self.data.state() {
            ContextState::Active => self.deactivate(context_id, None).await,
            state => debug!(%state, "nothing to tear down"),
        }
    }

    pub(super) fn handle_event(&mut self, event: RilEvent) {
        match event {
            RilEvent::Reply(reply) => self.handle_reply(reply),
            RilEvent::Unsolicited(message)
                if message.code == unsolicited::DATA_CALL_LIST_CHANGED =>
            {
                self.handle_call_list(&message.payload)
            }
            RilEvent::Unsolicited(message) => {
                debug!(code = message.code, "ignoring unsolicited message")
            }
        }
    }

    pub(super) fn expire_pending(&mut self, now: Instant) {
        let Some(pending) = self.correlator.take_expired(now) else {
            return;
        };

        warn!(
            serial = pending.serial,
            kind = ?pending.kind(),
            state = %self.data.state(),
            "request timed out"
        );
        self.set_disconnected();
        pending.completion.fail(Failure::timeout().into());
    }

    /// Releases the context when its driver goes away.
    pub(super) async fn remove(&mut self) {
        if let Some(pending) = self.correlator.drain() {
            debug!(serial = pending.serial, "abandoning outstanding request");
            pending.completion.fail(Error::Closed);
        } else if let Some(context_id) = self.data.context_id()
            && self.data.state() == ContextState::Active
        {
            self.shutdown_now(context_id).await;
            if let Some(pending) = self.correlator.drain() {
                debug!(serial = pending.serial, "teardown queued during removal");
            }
        }

        self.set_disconnected();
    }

    fn handle_reply(&mut self, reply: RilReply) {
        let Some(pending) = self.correlator.take(reply.serial) else {
            debug!(serial = reply.serial, "discarding reply without pending request");
            return;
        };

        match pending.completion {
            Completion::Activate(responder) => {
                let result = self.complete_activation(&reply);
                let _ = responder.send(result);
            }
            Completion::Deactivate(responder) => {
                self.complete_deactivation(pending.context_id, &reply, responder)
            }
        }
    }

    fn complete_activation(&mut self, reply: &RilReply) -> Result<Ipv4Settings> {
        info!(serial = reply.serial, "setting up data call");

        if !reply.error.is_success() {
            error!(error = %reply.error, "SETUP_DATA_CALL reply failure");
            self.set_disconnected();
            return Err(Failure::protocol(reply.error.code()).into());
        }

        let decoded = match self.codec.decode_setup_data_call(&reply.payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(error = %err, "malformed SETUP_DATA_CALL reply");
                self.set_disconnected();
                return Err(Failure::parse().into());
            }
        };

        if decoded.status != 0 {
            error!(
                status = decoded.status,
                call_id = decoded.call_id,
                "data call setup rejected by network"
            );
            self.set_disconnected();
            return Err(Failure::protocol(decoded.status).into());
        }

        let settings = match address::from_setup_reply(&decoded, &self.config.addressing) {
            Ok(settings) => settings,
            Err(err) => {
                error!(
                    error = %err,
                    addresses = ?decoded.addresses,
                    "invalid IP address field returned"
                );
                self.set_disconnected();
                return Err(Failure::parse().into());
            }
        };

        self.data.set_active(decoded.call_id, settings.clone());
        self.publish_state();
        info!(
            call_id = decoded.call_id,
            interface = ?settings.interface,
            address = %settings.address,
            netmask = %settings.netmask,
            dns = settings.dns.len(),
            "context active"
        );
        Ok(settings)
    }

    fn complete_deactivation(
        &mut self,
        context_id: Option<u32>,
        reply: &RilReply,
        responder: Option<oneshot::Sender<Result<()>>>,
    ) {
        info!(serial = reply.serial, "deactivating data call");
        self.set_disconnected();

        if !reply.error.is_success() {
            error!(error = %reply.error, "DEACTIVATE_DATA_CALL reply failure");
            Completion::Deactivate(responder).fail(Failure::protocol(reply.error.code()).into());
            return;
        }

        match responder {
            Some(responder) => {
                let _ = responder.send(Ok(()));
            }
            // A shutdown teardown has nobody waiting on it.
            None => {
                if let Some(context_id) = context_id {
                    self.notify(ContextNotification::Deactivated { context_id });
                }
            }
        }
    }

    fn handle_call_list(&mut self, payload: &[u8]) {
        let list = match self.codec.decode_data_call_list(payload) {
            Ok(list) => list,
            Err(err) => {
                warn!(error = %err, "dropping malformed data call list");
                return;
            }
        };

        let state = self.data.state();
        if state != ContextState::Active {
            debug!(%state, calls = list.records.len(), "call list ignored");
            return;
        }

        match reconcile(
            self.data.call_id(),
            self.data.settings(),
            &list,
            &self.config.addressing,
        ) {
            Reconciliation::Unmatched | Reconciliation::Unchanged => {}
            Reconciliation::Deactivated => {
                let context_id = self.data.context_id();
                error!(call_id = ?self.data.call_id(), "clearing active context");
                self.set_disconnected();
                if let Some(context_id) = context_id {
                    self.notify(ContextNotification::Deactivated { context_id });
                }
            }
            Reconciliation::Refreshed(settings) => {
                debug!(address = %settings.address, dns = settings.dns.len(), "refreshed addressing");
                self.data.refresh(settings);
            }
        }
    }

    fn set_disconnected(&mut self) {
        self.data.set_disconnected();
        self.publish_state();
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.data.state());
    }

    fn notify(&self, notification: ContextNotification) {
        info!(?notification, "context notification");
        let _ = self.notifications.send(notification);
    }
}

fn respond_deactivate(responder: Option<oneshot::Sender<Result<()>>>, result: Result<()>) {
    match (responder, result) {
        (Some(responder), result) => {
            let _ = responder.send(result);
        }
        (None, Err(err)) => debug!(error = %err, "shutdown teardown not performed"),
        (None, Ok(())) => {}
    }
}
