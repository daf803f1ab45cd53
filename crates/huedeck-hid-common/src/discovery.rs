//! Interface discovery.
//!
//! The macropad enumerates as several HID interfaces; the VIA
//! configuration endpoint and the consumer-control endpoint are told apart
//! by usage page. Exactly one interface is expected to match each.

use crate::error::HidError;
use crate::transport::HidTransport;
use hidapi::HidApi;
use huedeck_hid_via_protocol::{
    ViaSession,
    ids::{PRODUCT_ID, VENDOR_ID, VIA_USAGE_PAGE},
};
use tracing::debug;

/// Open the unique interface carrying `usage_page` on the supported device.
pub fn open_interface(api: &HidApi, usage_page: u16) -> Result<HidTransport, HidError> {
    let matches: Vec<_> = api
        .device_list()
        .filter(|d| {
            d.vendor_id() == VENDOR_ID
                && d.product_id() == PRODUCT_ID
                && d.usage_page() == usage_page
        })
        .collect();
    let [info] = matches.as_slice() else {
        return Err(HidError::DeviceNotFound {
            usage_page,
            matches: matches.len(),
        });
    };
    debug!(
        usage_page = format_args!("{usage_page:#06x}"),
        path = ?info.path(),
        "opening hid interface"
    );
    let device = info
        .open_device(api)
        .map_err(|e| HidError::Api(e.to_string()))?;
    Ok(HidTransport::new(device))
}

/// Open a typed command session on the VIA configuration interface.
pub fn open_control_session(api: &HidApi) -> Result<ViaSession<HidTransport>, HidError> {
    Ok(ViaSession::new(open_interface(api, VIA_USAGE_PAGE)?))
}
