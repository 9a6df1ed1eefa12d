//! Binary wire protocol
//!
//! A closed set of message variants framed as a kind tag, a fixed header
//! (protocol version, session id, message id, send timestamp) and a
//! variant-specific payload, all little-endian. The protocol version must
//! equal [`crate::constants::PROTOCOL_VERSION`] exactly; no compatibility
//! across versions is attempted.

pub mod codec;
pub mod message;

pub use codec::{decode_message, encode_message};
pub use message::{
    DeleteData, FenceType, GetData, GetFlags, Handedness, Header, MeshRefineSettings, Message,
    MessageBody, PollType, QueryKind, ResponseData, SceneSettings, TextData, TextKind,
};
