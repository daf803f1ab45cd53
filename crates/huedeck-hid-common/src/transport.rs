//! hidapi-backed implementation of the protocol transport.

use huedeck_hid_via_protocol::{ViaProtocolError, ViaTransport, ids::REPORT_SIZE};

/// Owns one open hidapi device handle.
#[derive(Debug)]
pub struct HidTransport {
    device: hidapi::HidDevice,
}

impl HidTransport {
    pub fn new(device: hidapi::HidDevice) -> Self {
        Self { device }
    }
}

impl ViaTransport for HidTransport {
    fn write_report(&mut self, data: &[u8]) -> Result<(), ViaProtocolError> {
        self.device
            .write(data)
            .map_err(|e| ViaProtocolError::Transport(e.to_string()))?;
        Ok(())
    }

    fn read_timeout(&mut self, timeout_ms: u64) -> Result<Option<Vec<u8>>, ViaProtocolError> {
        let mut buf = [0u8; REPORT_SIZE];
        let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
        let n = self
            .device
            .read_timeout(&mut buf, timeout)
            .map_err(|e| ViaProtocolError::Transport(e.to_string()))?;
        Ok((n > 0).then(|| buf[..n].to_vec()))
    }
}
