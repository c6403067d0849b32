use tokio::sync::watch;
use tracing::info;

use crate::config::RoamingPolicy;
use crate::error::Failure;

/// Network registration status as reported by the modem (3GPP 27.007 `+CREG`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationStatus {
    NotRegistered,
    Registered,
    Searching,
    Denied,
    #[default]
    Unknown,
    Roaming,
}

/// Read-only view of the current network registration.
pub trait RegistrationStatusProvider: Send + Sync + 'static {
    fn registration_status(&self) -> RegistrationStatus;
}

impl RegistrationStatusProvider for RegistrationStatus {
    fn registration_status(&self) -> RegistrationStatus {
        *self
    }
}

impl RegistrationStatusProvider for watch::Receiver<RegistrationStatus> {
    fn registration_status(&self) -> RegistrationStatus {
        *self.borrow()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoamingGuard {
    policy: RoamingPolicy,
}

impl RoamingGuard {
    pub fn new(policy: RoamingPolicy) -> Self {
        Self { policy }
    }

    /// Denies activation while roaming unless roaming data is allowed.
    pub fn check<R>(&self, provider: &R) -> Result<(), Failure>
    where
        R: RegistrationStatusProvider + ?Sized,
    {
        let status = provider.registration_status();
        if status == RegistrationStatus::Roaming && !self.policy.allow_roaming {
            info!(?status, "roaming data disabled, refusing activation");
            return Err(Failure::policy_rejection());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn denies_roaming_when_disallowed() {
        let guard = RoamingGuard::new(RoamingPolicy {
            allow_roaming: false,
        });
        let failure = guard
            .check(&RegistrationStatus::Roaming)
            .expect_err("roaming denied");
        assert_eq!(failure.kind, FailureKind::PolicyRejection);
    }

    #[test]
    fn allows_home_network_and_permitted_roaming() {
        let strict = RoamingGuard::new(RoamingPolicy {
            allow_roaming: false,
        });
        for status in [
            RegistrationStatus::Registered,
            RegistrationStatus::Searching,
            RegistrationStatus::Unknown,
        ] {
            assert!(strict.check(&status).is_ok());
        }

        let lenient = RoamingGuard::new(RoamingPolicy {
            allow_roaming: true,
        });
        assert!(lenient.check(&RegistrationStatus::Roaming).is_ok());
    }

    #[test]
    fn follows_live_registration_updates() {
        let guard = RoamingGuard::new(RoamingPolicy::default());
        let (tx, rx) = watch::channel(RegistrationStatus::Registered);
        assert!(guard.check(&rx).is_ok());

        tx.send(RegistrationStatus::Roaming).unwrap();
        assert!(guard.check(&rx).is_err());
    }
}
