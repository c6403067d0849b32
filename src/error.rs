use std::fmt;

use thiserror::Error;

use crate::gprs::ContextState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{operation} rejected while context is {state}")]
    InvalidState {
        operation: &'static str,
        state: ContextState,
    },

    #[error("request failed: {0}")]
    Failure(#[from] Failure),

    #[error("context driver closed")]
    Closed,
}

impl Error {
    pub fn transport<E: fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn codec<E: fmt::Display>(err: E) -> Self {
        Self::Codec(err.to_string())
    }

    pub fn configuration<E: fmt::Display>(err: E) -> Self {
        Self::Configuration(err.to_string())
    }

    /// Returns the request failure carried by this error, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Classification of an activation or deactivation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Outgoing parameters could not be encoded.
    Validation,
    /// The transport refused to queue the request.
    Transport,
    /// The radio layer answered with a non-success status.
    Protocol,
    /// The reply payload was malformed or lacked a usable address.
    Parse,
    /// Activation denied by the roaming policy.
    PolicyRejection,
    /// No reply arrived before the request deadline.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Validation => "validation failure",
            FailureKind::Transport => "transport failure",
            FailureKind::Protocol => "protocol failure",
            FailureKind::Parse => "parse failure",
            FailureKind::PolicyRejection => "policy rejection",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A failed request together with the raw code reported by the layer that
/// rejected it (RIL error, reply status or errno).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} (code {code})")]
pub struct Failure {
    pub kind: FailureKind,
    pub code: i32,
}

impl Failure {
    pub fn new(kind: FailureKind, code: i32) -> Self {
        Self { kind, code }
    }

    pub fn validation() -> Self {
        Self::new(FailureKind::Validation, libc::EINVAL)
    }

    pub fn transport() -> Self {
        Self::new(FailureKind::Transport, libc::EIO)
    }

    pub fn protocol(code: i32) -> Self {
        Self::new(FailureKind::Protocol, code)
    }

    pub fn parse() -> Self {
        Self::new(FailureKind::Parse, libc::EINVAL)
    }

    pub fn policy_rejection() -> Self {
        Self::new(FailureKind::PolicyRejection, libc::EACCES)
    }

    pub fn timeout() -> Self {
        Self::new(FailureKind::Timeout, libc::ETIMEDOUT)
    }
}
