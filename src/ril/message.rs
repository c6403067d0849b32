use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Token the transport assigns to each queued request.
pub type Serial = u32;

/// Solicited request identifiers.
pub mod request {
    pub const SETUP_DATA_CALL: u32 = 27;
    pub const DEACTIVATE_DATA_CALL: u32 = 41;

    pub fn name(code: u32) -> &'static str {
        match code {
            SETUP_DATA_CALL => "SETUP_DATA_CALL",
            DEACTIVATE_DATA_CALL => "DEACTIVATE_DATA_CALL",
            _ => "UNKNOWN_REQUEST",
        }
    }
}

/// Unsolicited event identifiers.
pub mod unsolicited {
    pub const DATA_CALL_LIST_CHANGED: u32 = 1010;
}

/// Status carried by every solicited reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RilError(pub i32);

impl RilError {
    pub const SUCCESS: Self = Self(0);
    pub const RADIO_NOT_AVAILABLE: Self = Self(1);
    pub const GENERIC_FAILURE: Self = Self(2);
    pub const REQUEST_NOT_SUPPORTED: Self = Self(6);
    pub const CANCELLED: Self = Self(7);
    pub const OP_NOT_ALLOWED_BEFORE_REG_TO_NW: Self = Self(9);
    pub const SIM_ABSENT: Self = Self(11);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "SUCCESS",
            1 => "RADIO_NOT_AVAILABLE",
            2 => "GENERIC_FAILURE",
            3 => "PASSWORD_INCORRECT",
            4 => "SIM_PIN2",
            5 => "SIM_PUK2",
            6 => "REQUEST_NOT_SUPPORTED",
            7 => "CANCELLED",
            8 => "OP_NOT_ALLOWED_DURING_VOICE_CALL",
            9 => "OP_NOT_ALLOWED_BEFORE_REG_TO_NW",
            10 => "SMS_SEND_FAIL_RETRY",
            11 => "SIM_ABSENT",
            12 => "SUBSCRIPTION_NOT_AVAILABLE",
            13 => "MODE_NOT_SUPPORTED",
            14 => "FDN_CHECK_FAILURE",
            15 => "ILLEGAL_SIM_OR_ME",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for RilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioTechnology {
    Gprs,
    Edge,
    Umts,
    Hsdpa,
    Hsupa,
    Hspa,
    Lte,
}

impl RadioTechnology {
    pub fn code(self) -> u32 {
        match self {
            RadioTechnology::Gprs => 1,
            RadioTechnology::Edge => 2,
            RadioTechnology::Umts => 3,
            RadioTechnology::Hsdpa => 9,
            RadioTechnology::Hsupa => 10,
            RadioTechnology::Hspa => 11,
            RadioTechnology::Lte => 14,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProfile {
    Default,
    Tethered,
}

impl DataProfile {
    pub fn code(self) -> u32 {
        match self {
            DataProfile::Default => 0,
            DataProfile::Tethered => 1,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    Pap,
    Chap,
    PapOrChap,
}

impl AuthMode {
    pub fn code(self) -> u32 {
        match self {
            AuthMode::None => 0,
            AuthMode::Pap => 1,
            AuthMode::Chap => 2,
            AuthMode::PapOrChap => 3,
        }
    }
}

/// PDP type requested for the data call.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PdpProtocol {
    #[default]
    Ip,
    Ipv6,
    Ipv4v6,
}

impl PdpProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            PdpProtocol::Ip => "IP",
            PdpProtocol::Ipv6 => "IPV6",
            PdpProtocol::Ipv4v6 => "IPV4V6",
        }
    }
}

impl std::str::FromStr for PdpProtocol {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "IP" => Ok(PdpProtocol::Ip),
            "IPV6" => Ok(PdpProtocol::Ipv6),
            "IPV4V6" => Ok(PdpProtocol::Ipv4v6),
            other => Err(format!("unknown PDP protocol {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeactivateReason {
    #[default]
    NoReason,
}

impl DeactivateReason {
    pub fn code(self) -> u32 {
        match self {
            DeactivateReason::NoReason => 0,
        }
    }
}

/// Link state of a data call as reported in call lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveState {
    Inactive,
    LinkDown,
    Active,
}

impl ActiveState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ActiveState::Inactive),
            1 => Some(ActiveState::LinkDown),
            2 => Some(ActiveState::Active),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ActiveState::Inactive => 0,
            ActiveState::LinkDown => 1,
            ActiveState::Active => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDataCallRequest {
    pub technology: RadioTechnology,
    pub data_profile: DataProfile,
    pub apn: String,
    pub username: String,
    pub password: String,
    pub auth_mode: AuthMode,
    pub protocol: PdpProtocol,
}

/// Decoded `SETUP_DATA_CALL` reply.
///
/// Address, gateway and DNS fields are the raw tokens sent by the modem; they
/// may hold several space separated entries and are interpreted by the
/// context's address extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupDataCallReply {
    pub status: i32,
    pub retry_time: i32,
    pub call_id: i32,
    pub protocol: Option<String>,
    pub interface: Option<String>,
    pub addresses: Option<String>,
    pub dnses: Option<String>,
    pub gateways: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivateDataCallRequest {
    pub call_id: i32,
    pub reason: DeactivateReason,
}

/// One entry of an unsolicited data call list.
///
/// The DNS token of a call list entry is comma delimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataCallRecord {
    pub status: i32,
    pub retry_time: i32,
    pub call_id: i32,
    pub active: ActiveState,
    pub protocol: Option<String>,
    pub interface: Option<String>,
    pub addresses: Option<String>,
    pub dnses: Option<String>,
    pub gateways: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataCallList {
    pub version: i32,
    pub records: Vec<DataCallRecord>,
}
