//! HID plumbing errors.

/// Errors from device discovery and the hidapi transport.
#[derive(Debug, thiserror::Error)]
pub enum HidError {
    /// No unique interface matched the expected identity.
    ///
    /// Exactly one interface is expected per usage page; zero matches means
    /// the device is absent, more than one means the host enumerated it in
    /// a way this design does not handle.
    #[error("device interface not found: usage page {usage_page:#06x} matched {matches} interfaces")]
    DeviceNotFound { usage_page: u16, matches: usize },

    /// hidapi-level failure.
    #[error("hid api error: {0}")]
    Api(String),
}
