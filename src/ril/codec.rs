use bytes::Bytes;

use crate::error::Result;

use super::message::{
    DataCallList, DeactivateDataCallRequest, SetupDataCallReply, SetupDataCallRequest,
};

/// Wire codec for the data call messages exchanged with the radio layer.
///
/// Encoding errors are reported as [`crate::Error::Codec`] and are never sent
/// to the transport.
pub trait RilCodec: Send + Sync + 'static {
    fn encode_setup_data_call(&self, request: &SetupDataCallRequest) -> Result<Bytes>;

    fn decode_setup_data_call(&self, payload: &[u8]) -> Result<SetupDataCallReply>;

    fn encode_deactivate_data_call(&self, request: &DeactivateDataCallRequest) -> Result<Bytes>;

    fn decode_data_call_list(&self, payload: &[u8]) -> Result<DataCallList>;
}
