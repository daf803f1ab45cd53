//! hidapi plumbing for the huedeck macropad.
//!
//! Everything protocol-shaped lives in `huedeck-hid-via-protocol`; this
//! crate only knows how to find the right USB interface, move bytes, and
//! pump raw input reports into a channel.

pub mod discovery;
pub mod error;
pub mod reader;
pub mod transport;

pub use discovery::{open_control_session, open_interface};
pub use error::HidError;
pub use reader::ReportReader;
pub use transport::HidTransport;
