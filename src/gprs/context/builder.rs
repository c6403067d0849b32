use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::gprs::netreg::RegistrationStatusProvider;
use crate::ril::{
    EventSink, ParcelCodec, RegistrationId, RilCodec, RilEvent, RilTransport, unsolicited,
};

use super::address::Ipv4Settings;
use super::machine::{ActivateRequest, Command, GprsContext};
use super::state::{ContextNotification, ContextState};

const COMMAND_QUEUE: usize = 16;
const NOTIFICATION_CAPACITY: usize = 16;

pub struct GprsContextBuilder<T, R, C = ParcelCodec> {
    config: ContextConfig,
    transport: Arc<T>,
    netreg: Arc<R>,
    codec: C,
}

impl<T, R> GprsContextBuilder<T, R, ParcelCodec>
where
    T: RilTransport,
    R: RegistrationStatusProvider,
{
    pub fn new(config: ContextConfig, transport: Arc<T>, netreg: Arc<R>) -> Self {
        Self {
            config,
            transport,
            netreg,
            codec: ParcelCodec::new(),
        }
    }
}

impl<T, R, C> GprsContextBuilder<T, R, C>
where
    T: RilTransport,
    R: RegistrationStatusProvider,
    C: RilCodec,
{
    pub fn with_codec<D: RilCodec>(self, codec: D) -> GprsContextBuilder<T, R, D> {
        GprsContextBuilder {
            config: self.config,
            transport: self.transport,
            netreg: self.netreg,
            codec,
        }
    }

    /// Validates the configuration. Nothing is registered with the transport
    /// until [`GprsContextRuntime::start`].
    pub async fn build(self) -> Result<GprsContextRuntime<T, R, C>> {
        self.config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ContextState::Idle);
        let machine = GprsContext::new(
            Arc::new(self.config),
            self.transport.clone(),
            Arc::new(self.codec),
            self.netreg,
            events_tx.clone(),
            notifications.clone(),
            state_tx,
        );

        Ok(GprsContextRuntime {
            machine,
            transport: self.transport,
            sink: events_tx,
            events: events_rx,
            notifications,
            state: state_rx,
        })
    }
}

pub struct GprsContextRuntime<T, R, C = ParcelCodec> {
    machine: GprsContext<T, C, R>,
    transport: Arc<T>,
    sink: EventSink,
    events: mpsc::UnboundedReceiver<RilEvent>,
    notifications: broadcast::Sender<ContextNotification>,
    state: watch::Receiver<ContextState>,
}

impl<T, R, C> GprsContextRuntime<T, R, C>
where
    T: RilTransport,
    R: RegistrationStatusProvider,
    C: RilCodec,
{
    /// Subscribes to call list changes and spawns the task that owns the
    /// context. The subscription is released when that task ends. Must be
    /// called inside a tokio runtime.
    pub async fn start(self) -> Result<ContextHandle> {
        let registration = UnsolicitedRegistration::register(
            self.transport.as_ref(),
            unsolicited::DATA_CALL_LIST_CHANGED,
            self.sink,
        )
        .await?;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let shutdown = CancellationToken::new();

        let driver = ContextDriver {
            machine: self.machine,
            transport: self.transport,
            events: self.events,
            commands: commands_rx,
            registration,
            shutdown: shutdown.clone(),
        };
        let worker = tokio::spawn(driver.run());

        Ok(ContextHandle {
            commands: commands_tx,
            notifications: self.notifications,
            state: self.state,
            shutdown,
            worker,
        })
    }
}

struct ContextDriver<T, C, R> {
    machine: GprsContext<T, C, R>,
    transport: Arc<T>,
    events: mpsc::UnboundedReceiver<RilEvent>,
    commands: mpsc::Receiver<Command>,
    registration: UnsolicitedRegistration,
    shutdown: CancellationToken,
}

impl<T, C, R> ContextDriver<T, C, R>
where
    T: RilTransport,
    C: RilCodec,
    R: RegistrationStatusProvider,
{
    async fn run(mut self) -> Result<()> {
        info!("gprs context driver started");

        loop {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("gprs context removal requested");
                    break;
                }
                Some(event) = self.events.recv() => self.machine.handle_event(event),
                command = self.commands.recv() => match command {
                    Some(command) => self.machine.dispatch(command).await,
                    None => {
                        debug!("all context handles dropped");
                        break;
                    }
                },
                _ = wait_until(deadline) => self.machine.expire_pending(Instant::now()),
            }
        }

        self.machine.remove().await;
        let released = self.registration.release(self.transport.as_ref()).await;
        if let Err(err) = &released {
            warn!(error = %err, "failed to release call list registration");
        }
        info!(state = %self.machine.state(), "gprs context driver stopped");
        released
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Listener for call list changes; released at most once.
struct UnsolicitedRegistration {
    id: Option<RegistrationId>,
}

impl UnsolicitedRegistration {
    async fn register<T>(transport: &T, code: u32, sink: EventSink) -> Result<Self>
    where
        T: RilTransport + ?Sized,
    {
        let id = transport.register(code, sink).await?;
        debug!(registration = id, code, "registered unsolicited listener");
        Ok(Self { id: Some(id) })
    }

    async fn release<T>(&mut self, transport: &T) -> Result<()>
    where
        T: RilTransport + ?Sized,
    {
        let Some(id) = self.id.take() else {
            return Ok(());
        };
        debug!(registration = id, "releasing unsolicited listener");
        transport.unregister(id).await
    }
}

impl Drop for UnsolicitedRegistration {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            warn!(registration = id, "unsolicited listener dropped without release");
        }
    }
}

/// Caller side of a running context.
pub struct ContextHandle {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<ContextNotification>,
    state: watch::Receiver<ContextState>,
    shutdown: CancellationToken,
    worker: JoinHandle<Result<()>>,
}

impl ContextHandle {
    /// Brings up a primary context and returns its IPv4 settings.
    pub async fn activate(&self, request: ActivateRequest) -> Result<Ipv4Settings> {
        self.request(|responder| Command::Activate { request, responder })
            .await
    }

    pub async fn deactivate(&self, context_id: u32) -> Result<()> {
        self.request(|responder| Command::Deactivate {
            context_id,
            responder,
        })
        .await
    }

    /// Queues a teardown nobody waits for. Success surfaces as
    /// [`ContextNotification::Deactivated`].
    pub async fn shutdown_now(&self, context_id: u32) -> Result<()> {
        self.commands
            .send(Command::ShutdownNow { context_id })
            .await
            .map_err(|_| Error::Closed)
    }

    pub fn notifications(&self) -> broadcast::Receiver<ContextNotification> {
        self.notifications.subscribe()
    }

    pub fn state(&self) -> ContextState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ContextState> {
        self.state.clone()
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Removes the context: tears down any attached call, releases the
    /// listener and waits for the task to finish.
    pub async fn close(self) -> Result<()> {
        let Self {
            shutdown, worker, ..
        } = self;
        shutdown.cancel();
        match worker.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::transport(format!(
                "context task panicked: {join_error}"
            ))),
        }
    }

    async fn request<O>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<O>>) -> Command,
    ) -> Result<O> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }
}
