use tracing::{debug, info};

use crate::config::AddressPolicy;
use crate::ril::{ActiveState, DataCallList};

use super::address::{Ipv4Settings, refresh_from_record};

/// What a call list means for the tracked call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Reconciliation {
    /// No entry refers to the tracked call.
    Unmatched,
    /// The tracked call is listed but its state needs no action.
    Unchanged,
    /// The tracked call went inactive.
    Deactivated,
    /// The tracked call is active with (possibly) new addressing.
    Refreshed(Ipv4Settings),
}

/// Matches a call list against the tracked call id.
///
/// Every context receives the full call list, so entries for other calls are
/// skipped. The first matching entry decides; later duplicates are ignored.
pub(super) fn reconcile(
    call_id: Option<i32>,
    current: Option<&Ipv4Settings>,
    list: &DataCallList,
    policy: &AddressPolicy,
) -> Reconciliation {
    let Some(call_id) = call_id else {
        return Reconciliation::Unmatched;
    };

    debug!(calls = list.records.len(), call_id, "reconciling data call list");

    let Some(record) = list.records.iter().find(|record| record.call_id == call_id) else {
        return Reconciliation::Unmatched;
    };

    if record.status != 0 {
        info!(call_id, status = record.status, "data call status");
    }

    match record.active {
        ActiveState::Inactive => Reconciliation::Deactivated,
        ActiveState::Active => match current {
            Some(current) => Reconciliation::Refreshed(refresh_from_record(current, record, policy)),
            None => Reconciliation::Unchanged,
        },
        ActiveState::LinkDown => {
            debug!(call_id, "data call link is down");
            Reconciliation::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::ril::DataCallRecord;

    fn record(call_id: i32, active: ActiveState, address: &str) -> DataCallRecord {
        DataCallRecord {
            status: 0,
            retry_time: -1,
            call_id,
            active,
            protocol: Some("IP".into()),
            interface: Some("rmnet0".into()),
            addresses: Some(address.into()),
            dnses: Some("8.8.8.8,8.8.4.4,8.8.8.4".into()),
            gateways: Some("10.1.2.1".into()),
        }
    }

    fn current() -> Ipv4Settings {
        Ipv4Settings {
            interface: Some("rmnet0".into()),
            address: Ipv4Addr::new(10, 1, 2, 3),
            netmask: Ipv4Addr::new(255, 255, 255, 252),
            gateway: None,
            dns: Vec::new(),
        }
    }

    fn list(records: Vec<DataCallRecord>) -> DataCallList {
        DataCallList {
            version: 6,
            records,
        }
    }

    #[test]
    fn other_calls_are_noise() {
        let calls = list(vec![
            record(3, ActiveState::Inactive, "10.0.0.1"),
            record(4, ActiveState::Active, "10.0.0.2"),
        ]);
        let outcome = reconcile(Some(7), Some(&current()), &calls, &AddressPolicy::default());
        assert_eq!(outcome, Reconciliation::Unmatched);
    }

    #[test]
    fn untracked_context_matches_nothing() {
        let calls = list(vec![record(7, ActiveState::Inactive, "10.0.0.1")]);
        let outcome = reconcile(None, None, &calls, &AddressPolicy::default());
        assert_eq!(outcome, Reconciliation::Unmatched);
    }

    #[test]
    fn inactive_entry_deactivates() {
        let calls = list(vec![
            record(3, ActiveState::Active, "10.0.0.1"),
            record(7, ActiveState::Inactive, "10.1.2.3/30"),
        ]);
        let outcome = reconcile(Some(7), Some(&current()), &calls, &AddressPolicy::default());
        assert_eq!(outcome, Reconciliation::Deactivated);
    }

    #[test]
    fn active_entry_refreshes_addressing() {
        let calls = list(vec![record(7, ActiveState::Active, "10.1.2.9/29")]);
        let Reconciliation::Refreshed(settings) =
            reconcile(Some(7), Some(&current()), &calls, &AddressPolicy::default())
        else {
            panic!("expected refresh");
        };
        assert_eq!(settings.address, Ipv4Addr::new(10, 1, 2, 9));
        assert_eq!(settings.netmask, Ipv4Addr::new(255, 255, 255, 248));
        assert_eq!(settings.dns.len(), 3);
        assert_eq!(settings.gateway, Some("10.1.2.1".parse().unwrap()));
    }

    #[test]
    fn first_match_wins() {
        let calls = list(vec![
            record(7, ActiveState::Active, "10.1.2.5/30"),
            record(7, ActiveState::Inactive, "10.1.2.6/30"),
        ]);
        let Reconciliation::Refreshed(settings) =
            reconcile(Some(7), Some(&current()), &calls, &AddressPolicy::default())
        else {
            panic!("expected refresh");
        };
        assert_eq!(settings.address, Ipv4Addr::new(10, 1, 2, 5));
    }

    #[test]
    fn link_down_is_informational() {
        let mut entry = record(7, ActiveState::LinkDown, "10.1.2.3/30");
        entry.status = -3;
        let calls = list(vec![entry]);
        let outcome = reconcile(Some(7), Some(&current()), &calls, &AddressPolicy::default());
        assert_eq!(outcome, Reconciliation::Unchanged);
    }
}
