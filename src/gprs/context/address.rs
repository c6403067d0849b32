use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;
use tracing::warn;

use crate::config::AddressPolicy;
use crate::ril::{DataCallRecord, SetupDataCallReply};

/// IPv4 configuration of an active data call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Settings {
    pub interface: Option<String>,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Option<IpAddr>,
    pub dns: Vec<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("no address reported")]
    Missing,

    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    #[error("invalid prefix length {0:?}")]
    InvalidPrefix(String),
}

/// Delimiter between DNS servers; setup replies and call lists differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsDelimiter {
    Whitespace,
    Comma,
}

pub(crate) fn netmask_from_prefix(prefix: u8) -> Option<Ipv4Addr> {
    match prefix {
        0 => Some(Ipv4Addr::UNSPECIFIED),
        1..=32 => Some(Ipv4Addr::from(u32::MAX << (32 - u32::from(prefix)))),
        _ => None,
    }
}

/// Parses the first entry of an address token, `a.b.c.d[/prefix]`.
///
/// RILD may report several addresses; only the first one is used.
pub(crate) fn parse_address(
    token: Option<&str>,
    policy: &AddressPolicy,
) -> Result<(Ipv4Addr, Ipv4Addr), AddressError> {
    let first = token
        .and_then(|value| value.split_whitespace().next())
        .ok_or(AddressError::Missing)?;

    let (address, prefix) = match first.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (first, None),
    };

    let address: Ipv4Addr = address
        .parse()
        .map_err(|_| AddressError::InvalidAddress(address.to_string()))?;

    let netmask = match prefix {
        Some(prefix) => prefix
            .parse::<u8>()
            .ok()
            .and_then(netmask_from_prefix)
            .ok_or_else(|| AddressError::InvalidPrefix(prefix.to_string()))?,
        None => policy.default_netmask,
    };

    Ok((address, netmask))
}

/// Reads a gateway token as a single address, without splitting.
pub(crate) fn parse_gateway(token: Option<&str>) -> Option<IpAddr> {
    let value = token.map(str::trim).filter(|value| !value.is_empty())?;
    match value.parse() {
        Ok(gateway) => Some(gateway),
        Err(_) => {
            warn!(gateway = %value, "ignoring unparseable gateway");
            None
        }
    }
}

pub(crate) fn split_dns(token: Option<&str>, delimiter: DnsDelimiter) -> Vec<IpAddr> {
    let Some(token) = token else {
        return Vec::new();
    };

    let entries: Vec<&str> = match delimiter {
        DnsDelimiter::Whitespace => token.split_whitespace().collect(),
        DnsDelimiter::Comma => token.split(',').map(str::trim).collect(),
    };

    entries
        .into_iter()
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(server) => Some(server),
            Err(_) => {
                warn!(dns = %entry, "ignoring unparseable DNS server");
                None
            }
        })
        .collect()
}

/// Builds the settings of a freshly established call from its setup reply.
pub(crate) fn from_setup_reply(
    reply: &SetupDataCallReply,
    policy: &AddressPolicy,
) -> Result<Ipv4Settings, AddressError> {
    let (address, netmask) = parse_address(reply.addresses.as_deref(), policy)?;
    let gateway_token = reply
        .gateways
        .as_deref()
        .and_then(|value| value.split_whitespace().next());

    Ok(Ipv4Settings {
        interface: reply.interface.clone(),
        address,
        netmask,
        gateway: parse_gateway(gateway_token),
        dns: split_dns(reply.dnses.as_deref(), DnsDelimiter::Whitespace),
    })
}

/// Re-applies a call list entry on top of the current settings.
///
/// Interface, address and gateway are only replaced when the entry carries
/// them; the DNS list always follows the entry.
pub(crate) fn refresh_from_record(
    current: &Ipv4Settings,
    record: &DataCallRecord,
    policy: &AddressPolicy,
) -> Ipv4Settings {
    let mut refreshed = current.clone();

    if let Some(interface) = record.interface.as_ref() {
        refreshed.interface = Some(interface.clone());
    }

    if record.addresses.is_some() {
        match parse_address(record.addresses.as_deref(), policy) {
            Ok((address, netmask)) => {
                refreshed.address = address;
                refreshed.netmask = netmask;
            }
            Err(err) => {
                warn!(call_id = record.call_id, error = %err, "keeping previous address")
            }
        }
    }

    if record.gateways.is_some() {
        refreshed.gateway = parse_gateway(record.gateways.as_deref());
    }

    refreshed.dns = split_dns(record.dnses.as_deref(), DnsDelimiter::Comma);
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ril::ActiveState;

    fn policy() -> AddressPolicy {
        AddressPolicy::default()
    }

    #[test]
    fn address_with_prefix_derives_netmask() {
        let (address, netmask) = parse_address(Some("10.1.2.3/30"), &policy()).unwrap();
        assert_eq!(address, Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(netmask, Ipv4Addr::new(255, 255, 255, 252));
    }

    #[test]
    fn address_without_prefix_uses_policy_netmask() {
        let (_, netmask) = parse_address(Some("10.1.2.3"), &policy()).unwrap();
        assert_eq!(netmask, Ipv4Addr::BROADCAST);

        let custom = AddressPolicy {
            default_netmask: Ipv4Addr::new(255, 255, 255, 0),
        };
        let (_, netmask) = parse_address(Some("10.1.2.3"), &custom).unwrap();
        assert_eq!(netmask, Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn only_first_address_is_used() {
        let (address, netmask) =
            parse_address(Some("10.0.0.9/24 2001:db8::1/64"), &policy()).unwrap();
        assert_eq!(address, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(netmask, Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn rejects_missing_and_malformed_addresses() {
        assert_eq!(parse_address(None, &policy()), Err(AddressError::Missing));
        assert_eq!(parse_address(Some("  "), &policy()), Err(AddressError::Missing));
        assert!(matches!(
            parse_address(Some("10.1.2/30"), &policy()),
            Err(AddressError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_address(Some("10.1.2.3/33"), &policy()),
            Err(AddressError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn prefix_table_edges() {
        assert_eq!(netmask_from_prefix(0), Some(Ipv4Addr::UNSPECIFIED));
        assert_eq!(netmask_from_prefix(8), Some(Ipv4Addr::new(255, 0, 0, 0)));
        assert_eq!(netmask_from_prefix(32), Some(Ipv4Addr::BROADCAST));
        assert_eq!(netmask_from_prefix(33), None);
    }

    #[test]
    fn dns_delimiters_follow_message_type() {
        let spaced = split_dns(Some("8.8.8.8 8.8.4.4"), DnsDelimiter::Whitespace);
        assert_eq!(spaced.len(), 2);

        let commas = split_dns(Some("8.8.8.8,8.8.4.4,8.8.8.4"), DnsDelimiter::Comma);
        assert_eq!(commas.len(), 3);
        assert_eq!(commas[2], "8.8.8.4".parse::<IpAddr>().unwrap());

        // A comma list is a single unparseable entry when read as whitespace.
        assert!(split_dns(Some("8.8.8.8,8.8.4.4"), DnsDelimiter::Whitespace).is_empty());
        assert!(split_dns(None, DnsDelimiter::Comma).is_empty());
    }

    #[test]
    fn gateway_token_is_not_split() {
        assert_eq!(
            parse_gateway(Some("10.1.2.1")),
            Some("10.1.2.1".parse().unwrap())
        );
        assert_eq!(parse_gateway(Some("10.1.2.1 10.1.2.2")), None);
        assert_eq!(parse_gateway(None), None);
    }

    #[test]
    fn record_refresh_keeps_absent_fields() {
        let current = Ipv4Settings {
            interface: Some("rmnet0".into()),
            address: Ipv4Addr::new(10, 1, 2, 3),
            netmask: Ipv4Addr::new(255, 255, 255, 252),
            gateway: Some("10.1.2.1".parse().unwrap()),
            dns: vec!["8.8.8.8".parse().unwrap()],
        };
        let record = DataCallRecord {
            status: 0,
            retry_time: -1,
            call_id: 7,
            active: ActiveState::Active,
            protocol: None,
            interface: None,
            addresses: Some("10.9.9.9/29".into()),
            dnses: Some("1.1.1.1,1.0.0.1".into()),
            gateways: None,
        };

        let refreshed = refresh_from_record(&current, &record, &policy());
        assert_eq!(refreshed.interface.as_deref(), Some("rmnet0"));
        assert_eq!(refreshed.address, Ipv4Addr::new(10, 9, 9, 9));
        assert_eq!(refreshed.netmask, Ipv4Addr::new(255, 255, 255, 248));
        assert_eq!(refreshed.gateway, current.gateway);
        assert_eq!(refreshed.dns.len(), 2);
    }
}
