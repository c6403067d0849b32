use std::net::Ipv4Addr;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ril::{AuthMode, DataProfile, RadioTechnology};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest request timeout accepted by [`ContextConfig::validate`].
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioProfile {
    pub technology: RadioTechnology,
    pub data_profile: DataProfile,
    pub auth_mode: AuthMode,
}

impl Default for RadioProfile {
    fn default() -> Self {
        Self {
            technology: RadioTechnology::Hspa,
            data_profile: DataProfile::Default,
            auth_mode: AuthMode::PapOrChap,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoamingPolicy {
    /// Permit packet data while registered on a roaming network.
    pub allow_roaming: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Upper bound on how long a setup or teardown request may stay unanswered.
    pub request_timeout_secs: u64,
}

impl TimerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct AddressPolicy {
    /// Netmask applied when the modem reports an address without a prefix length.
    pub default_netmask: Ipv4Addr,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            default_netmask: Ipv4Addr::BROADCAST,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    pub radio: RadioProfile,
    pub roaming: RoamingPolicy,
    pub timers: TimerConfig,
    pub addressing: AddressPolicy,
}

impl ContextConfig {
    pub fn validate(&self) -> Result<()> {
        let timeout = self.timers.request_timeout_secs;
        if timeout == 0 {
            return Err(Error::configuration(
                "request timeout must be at least one second",
            ));
        }
        if timeout > MAX_REQUEST_TIMEOUT_SECS {
            return Err(Error::configuration(format!(
                "request timeout of {timeout}s exceeds {MAX_REQUEST_TIMEOUT_SECS}s"
            )));
        }

        let mask = u32::from(self.addressing.default_netmask);
        if mask.leading_ones() + mask.trailing_zeros() != 32 {
            return Err(Error::configuration(format!(
                "default netmask {} is not contiguous",
                self.addressing.default_netmask
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ContextConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timers.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.addressing.default_netmask, Ipv4Addr::BROADCAST);
        assert!(!config.roaming.allow_roaming);
    }

    #[test]
    fn rejects_out_of_range_timeout_and_ragged_netmask() {
        let mut config = ContextConfig::default();
        config.timers.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.timers.request_timeout_secs = MAX_REQUEST_TIMEOUT_SECS + 1;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.timers.request_timeout_secs = MAX_REQUEST_TIMEOUT_SECS;
        assert!(config.validate().is_ok());

        let mut config = ContextConfig::default();
        config.addressing.default_netmask = Ipv4Addr::new(255, 0, 255, 0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }
}
