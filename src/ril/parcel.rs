//! Android parcel codec for RIL data call messages.
//!
//! # Wire Format
//!
//! ```text
//! int32   little-endian, 4 bytes
//! string  int32 length in UTF-16 units (-1 for null), UTF-16LE units,
//!         a NUL unit, zero padding to a 4 byte boundary
//! array   int32 count followed by `count` strings
//! ```
//!
//! Requests are string arrays. Setup replies and call lists share one layout:
//!
//! ```text
//! version num { status retry cid active type ifname addresses dnses gateways }*num
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

use super::codec::RilCodec;
use super::message::{
    ActiveState, DataCallList, DataCallRecord, DeactivateDataCallRequest, SetupDataCallReply,
    SetupDataCallRequest,
};

/// Maximum APN length accepted by the modem.
pub const MAX_APN_LENGTH: usize = 100;

/// Maximum username or password length.
pub const MAX_CREDENTIAL_LENGTH: usize = 255;

/// Oldest data call response layout this codec understands.
pub const MIN_DATA_CALL_VERSION: i32 = 6;

/// Offset RIL applies to the radio technology in setup requests.
const RADIO_TECH_OFFSET: u32 = 2;

const CALL_RECORD_MIN_SIZE: usize = 9 * 4;

#[derive(Debug, Default)]
pub struct ParcelWriter {
    buf: BytesMut,
}

impl ParcelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn write_string(&mut self, value: Option<&str>) -> &mut Self {
        let Some(value) = value else {
            return self.write_i32(-1);
        };

        let units: Vec<u16> = value.encode_utf16().collect();
        self.buf.put_i32_le(units.len() as i32);
        for unit in &units {
            self.buf.put_u16_le(*unit);
        }
        self.buf.put_u16_le(0);
        let written = (units.len() + 1) * 2;
        self.buf.put_bytes(0, padding(written));
        self
    }

    pub fn write_string_array(&mut self, values: &[&str]) -> &mut Self {
        self.write_i32(values.len() as i32);
        for value in values {
            self.write_string(Some(value));
        }
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

pub struct ParcelReader<'a> {
    buf: &'a [u8],
}

impl<'a> ParcelReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        if self.buf.remaining() < 4 {
            return Err(Error::codec("parcel truncated while reading int32"));
        }
        Ok(self.buf.get_i32_le())
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let length = self.read_i32()?;
        if length == -1 {
            return Ok(None);
        }
        if length < 0 {
            return Err(Error::codec(format!("invalid string length {length}")));
        }

        let units = length as usize;
        let written = (units + 1) * 2;
        let total = written + padding(written);
        if self.buf.remaining() < total {
            return Err(Error::codec(format!(
                "parcel truncated: string of {units} units needs {total} bytes, {} left",
                self.buf.remaining()
            )));
        }

        let mut decoded = Vec::with_capacity(units);
        for _ in 0..units {
            decoded.push(self.buf.get_u16_le());
        }
        self.buf.advance(total - units * 2);

        String::from_utf16(&decoded)
            .map(Some)
            .map_err(Error::codec)
    }

    pub fn read_string_array(&mut self) -> Result<Vec<Option<String>>> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(Error::codec(format!("invalid array length {count}")));
        }
        (0..count).map(|_| self.read_string()).collect()
    }
}

fn padding(written: usize) -> usize {
    (4 - written % 4) % 4
}

/// Codec speaking the parcel format used by Android-style RIL daemons.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParcelCodec;

impl ParcelCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encodes a setup reply the way a modem would send it.
    pub fn encode_setup_reply(&self, reply: &SetupDataCallReply) -> Bytes {
        let mut writer = ParcelWriter::new();
        writer.write_i32(MIN_DATA_CALL_VERSION).write_i32(1);
        write_call(
            &mut writer,
            CallFields {
                status: reply.status,
                retry_time: reply.retry_time,
                call_id: reply.call_id,
                active: ActiveState::Active.code(),
                protocol: reply.protocol.as_deref(),
                interface: reply.interface.as_deref(),
                addresses: reply.addresses.as_deref(),
                dnses: reply.dnses.as_deref(),
                gateways: reply.gateways.as_deref(),
            },
        );
        writer.finish()
    }

    /// Encodes an unsolicited call list the way a modem would send it.
    pub fn encode_call_list(&self, list: &DataCallList) -> Bytes {
        let mut writer = ParcelWriter::new();
        writer
            .write_i32(list.version)
            .write_i32(list.records.len() as i32);
        for record in &list.records {
            write_call(
                &mut writer,
                CallFields {
                    status: record.status,
                    retry_time: record.retry_time,
                    call_id: record.call_id,
                    active: record.active.code(),
                    protocol: record.protocol.as_deref(),
                    interface: record.interface.as_deref(),
                    addresses: record.addresses.as_deref(),
                    dnses: record.dnses.as_deref(),
                    gateways: record.gateways.as_deref(),
                },
            );
        }
        writer.finish()
    }

    fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
        if value.contains('\0') {
            return Err(Error::codec(format!("{field} contains interior NUL")));
        }
        let length = value.encode_utf16().count();
        if length > max {
            return Err(Error::codec(format!(
                "{field} is {length} characters, limit is {max}"
            )));
        }
        Ok(())
    }

    fn read_version(reader: &mut ParcelReader<'_>) -> Result<i32> {
        let version = reader.read_i32()?;
        if version < MIN_DATA_CALL_VERSION {
            return Err(Error::codec(format!(
                "unsupported data call response version {version}"
            )));
        }
        Ok(version)
    }
}

struct CallFields<'a> {
    status: i32,
    retry_time: i32,
    call_id: i32,
    active: i32,
    protocol: Option<&'a str>,
    interface: Option<&'a str>,
    addresses: Option<&'a str>,
    dnses: Option<&'a str>,
    gateways: Option<&'a str>,
}

fn write_call(writer: &mut ParcelWriter, call: CallFields<'_>) {
    writer
        .write_i32(call.status)
        .write_i32(call.retry_time)
        .write_i32(call.call_id)
        .write_i32(call.active)
        .write_string(call.protocol)
        .write_string(call.interface)
        .write_string(call.addresses)
        .write_string(call.dnses)
        .write_string(call.gateways);
}

impl RilCodec for ParcelCodec {
    fn encode_setup_data_call(&self, request: &SetupDataCallRequest) -> Result<Bytes> {
        Self::check_length("APN", &request.apn, MAX_APN_LENGTH)?;
        Self::check_length("username", &request.username, MAX_CREDENTIAL_LENGTH)?;
        Self::check_length("password", &request.password, MAX_CREDENTIAL_LENGTH)?;

        let technology = (request.technology.code() + RADIO_TECH_OFFSET).to_string();
        let profile = request.data_profile.code().to_string();
        let auth = request.auth_mode.code().to_string();

        let mut writer = ParcelWriter::new();
        writer.write_string_array(&[
            technology.as_str(),
            profile.as_str(),
            request.apn.as_str(),
            request.username.as_str(),
            request.password.as_str(),
            auth.as_str(),
            request.protocol.as_str(),
        ]);
        Ok(writer.finish())
    }

    fn decode_setup_data_call(&self, payload: &[u8]) -> Result<SetupDataCallReply> {
        let mut reader = ParcelReader::new(payload);
        Self::read_version(&mut reader)?;
        let count = reader.read_i32()?;
        if count < 1 {
            return Err(Error::codec("setup reply carries no data call"));
        }

        let status = reader.read_i32()?;
        let retry_time = reader.read_i32()?;
        let call_id = reader.read_i32()?;
        let _active = reader.read_i32()?;

        Ok(SetupDataCallReply {
            status,
            retry_time,
            call_id,
            protocol: reader.read_string()?,
            interface: reader.read_string()?,
            addresses: reader.read_string()?,
            dnses: reader.read_string()?,
            gateways: reader.read_string()?,
        })
    }

    fn encode_deactivate_data_call(&self, request: &DeactivateDataCallRequest) -> Result<Bytes> {
        if request.call_id < 0 {
            return Err(Error::codec(format!(
                "cannot deactivate invalid call id {}",
                request.call_id
            )));
        }

        let call_id = request.call_id.to_string();
        let reason = request.reason.code().to_string();
        let mut writer = ParcelWriter::new();
        writer.write_string_array(&[call_id.as_str(), reason.as_str()]);
        Ok(writer.finish())
    }

    fn decode_data_call_list(&self, payload: &[u8]) -> Result<DataCallList> {
        let mut reader = ParcelReader::new(payload);
        let version = Self::read_version(&mut reader)?;
        let count = reader.read_i32()?;
        if count < 0 {
            return Err(Error::codec(format!("invalid data call count {count}")));
        }

        // Each record holds at least four ints and five null strings.
        let capacity = (count as usize).min(reader.remaining() / CALL_RECORD_MIN_SIZE);
        let mut records = Vec::with_capacity(capacity);
        for _ in 0..count {
            let status = reader.read_i32()?;
            let retry_time = reader.read_i32()?;
            let call_id = reader.read_i32()?;
            let active_code = reader.read_i32()?;
            let active = ActiveState::from_code(active_code).ok_or_else(|| {
                Error::codec(format!("unknown active state {active_code} for call {call_id}"))
            })?;

            records.push(DataCallRecord {
                status,
                retry_time,
                call_id,
                active,
                protocol: reader.read_string()?,
                interface: reader.read_string()?,
                addresses: reader.read_string()?,
                dnses: reader.read_string()?,
                gateways: reader.read_string()?,
            });
        }

        Ok(DataCallList { version, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ril::message::{AuthMode, DataProfile, DeactivateReason, PdpProtocol, RadioTechnology};

    fn setup_request(apn: &str) -> SetupDataCallRequest {
        SetupDataCallRequest {
            technology: RadioTechnology::Hspa,
            data_profile: DataProfile::Default,
            apn: apn.into(),
            username: "user".into(),
            password: "pass".into(),
            auth_mode: AuthMode::PapOrChap,
            protocol: PdpProtocol::Ip,
        }
    }

    #[test]
    fn setup_request_is_seven_string_array() {
        let payload = ParcelCodec
            .encode_setup_data_call(&setup_request("internet"))
            .expect("encode");

        let mut reader = ParcelReader::new(&payload);
        let fields = reader.read_string_array().expect("array");
        let fields: Vec<_> = fields.into_iter().map(|f| f.unwrap_or_default()).collect();
        assert_eq!(
            fields,
            vec!["13", "0", "internet", "user", "pass", "3", "IP"]
        );
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn strings_are_padded_to_word_boundary() {
        let mut writer = ParcelWriter::new();
        writer.write_string(Some("ab"));
        // length + 2 units + NUL = 10 bytes, padded to 12.
        assert_eq!(writer.finish().len(), 12);

        let mut writer = ParcelWriter::new();
        writer.write_string(Some("a"));
        assert_eq!(writer.finish().len(), 8);
    }

    #[test]
    fn oversized_apn_is_rejected() {
        let apn = "a".repeat(MAX_APN_LENGTH + 1);
        let err = ParcelCodec
            .encode_setup_data_call(&setup_request(&apn))
            .expect_err("oversized APN");
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn deactivate_request_carries_call_id_and_reason() {
        let payload = ParcelCodec
            .encode_deactivate_data_call(&DeactivateDataCallRequest {
                call_id: 7,
                reason: DeactivateReason::NoReason,
            })
            .expect("encode");
        let fields = ParcelReader::new(&payload)
            .read_string_array()
            .expect("array");
        assert_eq!(fields, vec![Some("7".to_string()), Some("0".to_string())]);
    }

    #[test]
    fn decodes_setup_reply_written_by_modem() {
        let reply = SetupDataCallReply {
            status: 0,
            retry_time: -1,
            call_id: 7,
            protocol: Some("IP".into()),
            interface: Some("rmnet0".into()),
            addresses: Some("10.1.2.3/30".into()),
            dnses: Some("8.8.8.8 8.8.4.4".into()),
            gateways: Some("10.1.2.1".into()),
        };
        let payload = ParcelCodec.encode_setup_reply(&reply);
        assert_eq!(ParcelCodec.decode_setup_data_call(&payload).expect("decode"), reply);
    }

    #[test]
    fn truncated_reply_is_a_codec_error() {
        let payload = ParcelCodec.encode_setup_reply(&SetupDataCallReply {
            interface: Some("rmnet0".into()),
            ..Default::default()
        });
        let truncated = &payload[..payload.len() - 6];
        assert!(ParcelCodec.decode_setup_data_call(truncated).is_err());
    }

    #[test]
    fn old_call_list_versions_are_rejected() {
        let mut writer = ParcelWriter::new();
        writer.write_i32(4).write_i32(0);
        let payload = writer.finish();
        assert!(ParcelCodec.decode_data_call_list(&payload).is_err());
    }

    #[test]
    fn unknown_active_state_is_rejected() {
        let mut writer = ParcelWriter::new();
        writer.write_i32(6).write_i32(1);
        writer
            .write_i32(0)
            .write_i32(-1)
            .write_i32(3)
            .write_i32(9);
        for _ in 0..5 {
            writer.write_string(None);
        }
        let payload = writer.finish();
        assert!(ParcelCodec.decode_data_call_list(&payload).is_err());
    }
}
