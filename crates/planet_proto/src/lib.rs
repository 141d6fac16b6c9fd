//! Wire protocol between the tank and the mothership.

mod error;
mod frame;
mod messages;


pub use error::ProtoError;
pub use frame::{
    decode_message, encode_control, encode_message, ControlFrame, Frame, FrameDecoder,
    MAX_FRAME_BYTES,
};
pub use messages::{
    InternalPlanetUpdate, MothershipMessage, NodeArrivalInfo, RequestResponse, TankMessage,
};
