mod context;
mod netreg;

pub use context::{
    ActivateRequest, ContextHandle, ContextNotification, ContextState, GprsContextBuilder,
    GprsContextRuntime, Ipv4Settings,
};
pub use netreg::{RegistrationStatus, RegistrationStatusProvider, RoamingGuard};
