//! Driver for a single primary GPRS context on top of the radio interface
//! layer.

mod address;
mod builder;
mod correlator;
mod machine;
mod reconciler;
mod state;

pub use address::Ipv4Settings;
pub use builder::{ContextHandle, GprsContextBuilder, GprsContextRuntime};
pub use machine::ActivateRequest;
pub use state::{ContextNotification, ContextState};
