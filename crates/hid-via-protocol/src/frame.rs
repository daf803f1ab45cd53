//! Command/response frame codec.
//!
//! Pure transforms between typed commands and the device's fixed-size
//! report format. No side effects.

use crate::error::ViaProtocolError;
use crate::ids::{FRAME_SIZE, PARAMS_CAPACITY, REPORT_SELECTOR, REPORT_SIZE, offsets};

/// Encode a command frame: report selector, command id, parameters, zero
/// padding up to the fixed frame size.
pub fn encode_command(command: u8, params: &[u8]) -> Result<[u8; FRAME_SIZE], ViaProtocolError> {
    if params.len() > PARAMS_CAPACITY {
        return Err(ViaProtocolError::ParamsTooLarge {
            len: params.len(),
            capacity: PARAMS_CAPACITY,
        });
    }
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = REPORT_SELECTOR;
    frame[1] = command;
    frame[2..2 + params.len()].copy_from_slice(params);
    Ok(frame)
}

/// A decoded response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    success: bool,
    bytes: [u8; REPORT_SIZE],
}

impl Response {
    /// Whether the response echoed the command id it was decoded against.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Full response body, command echo included.
    pub fn bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.bytes
    }

    /// Generic payload area starting at the fixed payload offset.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[offsets::PAYLOAD..]
    }

    /// Big-endian 16-bit value at the keycode offset.
    pub fn keycode(&self) -> u16 {
        u16::from_be_bytes([self.bytes[offsets::KEYCODE], self.bytes[offsets::KEYCODE + 1]])
    }

    /// Value pair reported by custom-menu value reads.
    pub fn value_pair(&self) -> (u8, u8) {
        (self.bytes[offsets::VALUE1], self.bytes[offsets::VALUE2])
    }
}

/// Decode a raw response against the command that solicited it.
///
/// A response whose first byte does not echo `command` is a failure. No
/// universal failure sentinel is assumed; firmware families disagree on
/// what they put there.
pub fn decode_response(command: u8, raw: &[u8]) -> Result<Response, ViaProtocolError> {
    if raw.len() < REPORT_SIZE {
        return Err(ViaProtocolError::MalformedFrame {
            len: raw.len(),
            expected: REPORT_SIZE,
        });
    }
    let mut bytes = [0u8; REPORT_SIZE];
    bytes.copy_from_slice(&raw[..REPORT_SIZE]);
    Ok(Response {
        success: bytes[0] == command,
        bytes,
    })
}
