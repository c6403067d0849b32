use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use clap::Parser;
use ril_gprs::config::{ContextConfig, RoamingPolicy, TimerConfig};
use ril_gprs::ril::{
    LoopbackTransport, ParcelCodec, PdpProtocol, RilError, SetupDataCallReply, request,
};
use ril_gprs::{ActivateRequest, GprsContextBuilder, RegistrationStatus};
use tracing::info;
#[cfg(not(feature = "telemetry"))]
use tracing::warn;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ril-gprs-demo",
    about = "Brings a GPRS context up and down against a simulated modem",
    version
)]
struct Cli {
    /// Access point name to activate
    #[arg(long, default_value = "internet")]
    apn: String,

    /// Username for PAP/CHAP authentication
    #[arg(long)]
    username: Option<String>,

    /// Password for PAP/CHAP authentication
    #[arg(long)]
    password: Option<String>,

    /// PDP type requested from the network (IP, IPV6, IPV4V6)
    #[arg(long, default_value = "IP")]
    protocol: String,

    /// Context identifier assigned by the caller
    #[arg(long, default_value_t = 1)]
    context_id: u32,

    /// Pretend the modem is registered on a roaming network
    #[arg(long)]
    roaming: bool,

    /// Permit packet data while roaming
    #[arg(long)]
    allow_roaming: bool,

    /// Address the simulated modem hands out, with optional prefix length
    #[arg(long, default_value = "10.64.12.7/30")]
    modem_address: String,

    /// Space separated DNS servers the simulated modem reports
    #[arg(long, default_value = "192.0.2.53 192.0.2.54")]
    modem_dns: String,

    /// Status the simulated modem puts in its setup reply (0 accepts)
    #[arg(long, default_value_t = 0)]
    modem_status: i32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// Seconds to keep the context up before deactivating (0 waits for Ctrl+C)
    #[arg(long, default_value_t = 2)]
    hold: u64,

    /// Log level when telemetry feature is enabled (default info)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn context_config(&self) -> ContextConfig {
        ContextConfig {
            roaming: RoamingPolicy {
                allow_roaming: self.allow_roaming,
            },
            timers: TimerConfig {
                request_timeout_secs: self.request_timeout,
            },
            ..Default::default()
        }
    }

    fn activate_request(&self) -> Result<ActivateRequest> {
        let protocol: PdpProtocol = self
            .protocol
            .parse()
            .map_err(|_| anyhow!("unknown PDP protocol {:?}", self.protocol))?;

        let request = ActivateRequest::new(self.context_id, self.apn.clone());
        let request = match (&self.username, &self.password) {
            (Some(username), Some(password)) => request.with_credentials(username, password),
            (None, None) => request,
            _ => return Err(anyhow!("both --username and --password must be provided")),
        };
        Ok(request.with_protocol(protocol))
    }

    fn setup_reply(&self) -> SetupDataCallReply {
        SetupDataCallReply {
            status: self.modem_status,
            retry_time: -1,
            call_id: 1,
            protocol: Some(self.protocol.clone()),
            interface: Some("rmnet0".into()),
            addresses: Some(self.modem_address.clone()),
            dnses: Some(self.modem_dns.clone()),
            gateways: None,
        }
    }
}

/// Answers every request the context sends, like a cooperative modem.
async fn simulate_modem(transport: Arc<LoopbackTransport>, setup: SetupDataCallReply) -> Result<()> {
    let codec = ParcelCodec::new();
    loop {
        let sent = transport.next_request().await;
        info!(
            serial = sent.serial,
            request = request::name(sent.code),
            bytes = sent.payload.len(),
            "modem received request"
        );
        let payload = match sent.code {
            request::SETUP_DATA_CALL => codec.encode_setup_reply(&setup),
            _ => Bytes::new(),
        };
        transport
            .reply(sent.serial, RilError::SUCCESS, payload)
            .await
            .context("deliver modem reply")?;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let activation = cli.activate_request()?;
    let registration = if cli.roaming {
        RegistrationStatus::Roaming
    } else {
        RegistrationStatus::Registered
    };

    let transport = Arc::new(LoopbackTransport::new());
    let modem = tokio::spawn(simulate_modem(transport.clone(), cli.setup_reply()));

    let runtime = GprsContextBuilder::new(cli.context_config(), transport, Arc::new(registration))
        .build()
        .await
        .context("initialise context runtime")?;
    let handle = runtime.start().await.context("start context runtime")?;

    let mut notifications = handle.notifications();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            info!(?notification, "context notification");
        }
    });

    match handle.activate(activation).await {
        Ok(settings) => {
            info!(
                interface = ?settings.interface,
                address = %settings.address,
                netmask = %settings.netmask,
                gateway = ?settings.gateway,
                dns = ?settings.dns,
                "context active"
            );

            if cli.hold == 0 {
                info!("press Ctrl+C to deactivate");
                tokio::signal::ctrl_c()
                    .await
                    .context("wait for shutdown signal")?;
            } else {
                tokio::time::sleep(Duration::from_secs(cli.hold)).await;
            }

            handle
                .deactivate(cli.context_id)
                .await
                .context("deactivate context")?;
            info!("context deactivated");
        }
        Err(err) => info!(error = %err, "activation failed"),
    }

    handle.close().await.context("close context")?;
    modem.abort();
    Ok(())
}

#[cfg(feature = "telemetry")]
fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = if let Ok(value) = std::env::var(EnvFilter::DEFAULT_ENV) {
        EnvFilter::new(value)
    } else {
        EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
    Ok(())
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_level: &str) -> Result<()> {
    if std::env::var("RUST_LOG").is_ok() {
        warn!("telemetry feature disabled; RUST_LOG ignored");
    }
    Ok(())
}
