//! Protocol identifiers and wire-layout constants.
//!
//! Everything here is data consulted by the codec and session layers:
//! command ids, value ids, report geometry, payload offsets. Remapping a
//! device means editing these tables, not the control flow.

/// USB vendor id of the supported macropad.
pub const VENDOR_ID: u16 = 0xD010;
/// USB product id of the supported macropad.
pub const PRODUCT_ID: u16 = 0x1601;

/// Usage page of the vendor-defined configuration interface.
pub const VIA_USAGE_PAGE: u16 = 0xFF60;
/// Usage page of the consumer-control interface that carries knob events.
pub const CONSUMER_USAGE_PAGE: u16 = 0x0C;

/// Size of a raw report as read back from the device.
pub const REPORT_SIZE: usize = 32;
/// Size of an outgoing frame: report selector byte plus the report body.
pub const FRAME_SIZE: usize = REPORT_SIZE + 1;
/// Report selector prefixed to every outgoing frame.
pub const REPORT_SELECTOR: u8 = 0x00;
/// Parameter capacity of a command frame (report body minus the command byte).
pub const PARAMS_CAPACITY: usize = REPORT_SIZE - 1;

/// Milliseconds to wait for a response before declaring the exchange dead.
pub const COMMAND_TIMEOUT_MS: u64 = 1000;

/// Command identifiers, matching the VIA app source.
pub mod commands {
    pub const GET_PROTOCOL_VERSION: u8 = 0x01;
    pub const GET_KEYBOARD_VALUE: u8 = 0x02;
    pub const SET_KEYBOARD_VALUE: u8 = 0x03;
    pub const DYNAMIC_KEYMAP_GET_KEYCODE: u8 = 0x04;
    pub const DYNAMIC_KEYMAP_SET_KEYCODE: u8 = 0x05;
    pub const CUSTOM_MENU_SET_VALUE: u8 = 0x07;
    pub const CUSTOM_MENU_GET_VALUE: u8 = 0x08;
    pub const CUSTOM_MENU_SAVE: u8 = 0x09;
    pub const DYNAMIC_KEYMAP_GET_ENCODER: u8 = 0x14;
    pub const DYNAMIC_KEYMAP_SET_ENCODER: u8 = 0x15;
}

/// RGB matrix addressing: custom-menu channel plus per-field value ids.
pub mod rgb {
    /// Custom-menu channel carrying the RGB matrix.
    pub const CHANNEL: u8 = 3;

    pub const BRIGHTNESS: u8 = 1;
    pub const EFFECT: u8 = 2;
    pub const EFFECT_SPEED: u8 = 3;
    pub const COLOR: u8 = 4;
}

/// Byte offsets inside a response body.
///
/// Response layouts echo the request parameters, so the interesting bytes
/// land at different offsets per command family.
pub mod offsets {
    /// First generic payload byte of a response.
    pub const PAYLOAD: usize = 4;
    /// Big-endian keycode location in keycode and encoder responses.
    pub const KEYCODE: usize = 4;
    /// Value pair location in custom-menu value responses.
    pub const VALUE1: usize = 3;
    pub const VALUE2: usize = 4;
}
