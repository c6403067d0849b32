//! Primary GPRS context driver for modems reached through a radio interface
//! layer (RIL) daemon.
//! The builder wires a [`ril::RilTransport`], a [`ril::RilCodec`] and the
//! network registration view into a single task that owns the context
//! lifecycle, pairs requests with replies and follows the modem's
//! unsolicited data call list.

pub mod config;
pub mod error;
pub mod gprs;
pub mod ril;

pub use config::ContextConfig;
pub use error::{Error, Failure, FailureKind, Result};
pub use gprs::{
    ActivateRequest, ContextHandle, ContextNotification, ContextState, GprsContextBuilder,
    GprsContextRuntime, Ipv4Settings, RegistrationStatus,
};
