//! VIA keyboard HID protocol: frame codec, report identities, typed commands.
//!
//! This crate is intentionally I/O-free. It provides pure codecs and a
//! command session generic over a transport trait, so everything can be
//! tested without hardware or OS-level HID plumbing.

pub mod error;
pub mod frame;
pub mod ids;
pub mod report;
pub mod session;

// Flat re-exports so callers can use `huedeck_hid_via_protocol::Foo`.
pub use error::ViaProtocolError;
pub use frame::{Response, decode_response, encode_command};
pub use report::{DIRECTION_OFFSET, RawEvent, Rotation};
pub use session::{EncoderMapping, RgbState, ViaSession, ViaTransport};
