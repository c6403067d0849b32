//! Radio interface layer boundary: typed messages, codec and transport.

mod codec;
#[cfg(any(test, feature = "testing"))]
mod loopback;
mod message;
mod parcel;
mod transport;

pub use codec::RilCodec;
#[cfg(any(test, feature = "testing"))]
pub use loopback::{LoopbackTransport, SentRequest};
pub use message::{
    ActiveState, AuthMode, DataCallList, DataCallRecord, DataProfile, DeactivateDataCallRequest,
    DeactivateReason, PdpProtocol, RadioTechnology, RilError, Serial, SetupDataCallReply,
    SetupDataCallRequest, request, unsolicited,
};
pub use parcel::{ParcelCodec, ParcelReader, ParcelWriter};
pub use transport::{
    EventSink, RegistrationId, RilEvent, RilReply, RilTransport, UnsolicitedMessage,
};
