//! Typed command session over a half-duplex transport.
//!
//! The exchange model is strictly request/response: the session writes one
//! frame and waits for the matching response before issuing the next
//! command. There is no pipelining on the wire.

use crate::error::ViaProtocolError;
use crate::frame::{Response, decode_response, encode_command};
use crate::ids::{COMMAND_TIMEOUT_MS, commands, rgb};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Raw report transport under a command session.
pub trait ViaTransport {
    /// Write one outgoing frame, report selector included.
    fn write_report(&mut self, data: &[u8]) -> Result<(), ViaProtocolError>;

    /// Read one incoming report, waiting at most `timeout_ms`.
    ///
    /// `Ok(None)` means the wait elapsed with no data.
    fn read_timeout(&mut self, timeout_ms: u64) -> Result<Option<Vec<u8>>, ViaProtocolError>;
}

/// Device lighting state as stored by the RGB matrix channel.
///
/// Every field travels over its own value-id command, so a partially read
/// or partially applied state is representable and legal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbState {
    pub brightness: Option<u8>,
    pub effect: Option<u8>,
    pub effect_speed: Option<u8>,
    pub hue: Option<u8>,
    pub saturation: Option<u8>,
}

/// One encoder's keycode assignments, captured per direction.
///
/// The two directions are independent wire operations; `None` records a
/// read the device refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderMapping {
    pub layer: u8,
    pub encoder: u8,
    pub clockwise: Option<u16>,
    pub counter_clockwise: Option<u16>,
}

/// Single-owner typed session over an open device transport.
#[derive(Debug)]
pub struct ViaSession<T: ViaTransport> {
    transport: Option<T>,
    timeout_ms: u64,
}

impl<T: ViaTransport> ViaSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, COMMAND_TIMEOUT_MS)
    }

    pub fn with_timeout(transport: T, timeout_ms: u64) -> Self {
        Self {
            transport: Some(transport),
            timeout_ms,
        }
    }

    /// Whether the underlying transport is still held.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Release the transport. Idempotent: closing twice is a no-op.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("via session closed");
        }
    }

    /// One command/response exchange.
    ///
    /// A missing response maps to [`ViaProtocolError::Timeout`]; the effect
    /// of the command on the device is then unknown.
    pub fn send(&mut self, command: u8, params: &[u8]) -> Result<Response, ViaProtocolError> {
        let frame = encode_command(command, params)?;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ViaProtocolError::Transport("session is closed".into()))?;
        transport.write_report(&frame)?;
        match transport.read_timeout(self.timeout_ms)? {
            Some(raw) => decode_response(command, &raw),
            None => Err(ViaProtocolError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    /// VIA protocol version reported by the firmware.
    pub fn protocol_version(&mut self) -> Result<Option<u16>, ViaProtocolError> {
        let response = self.send(commands::GET_PROTOCOL_VERSION, &[])?;
        Ok(response
            .success()
            .then(|| u16::from_be_bytes([response.bytes()[1], response.bytes()[2]])))
    }

    /// Keycode assigned at (layer, row, col), or `None` on device refusal.
    pub fn keycode(&mut self, layer: u8, row: u8, col: u8) -> Result<Option<u16>, ViaProtocolError> {
        let response = self.send(commands::DYNAMIC_KEYMAP_GET_KEYCODE, &[layer, row, col])?;
        Ok(response.success().then(|| response.keycode()))
    }

    /// Assign a keycode at (layer, row, col). Applies synchronously on the
    /// device; there is no rollback on failure.
    pub fn set_keycode(
        &mut self,
        layer: u8,
        row: u8,
        col: u8,
        keycode: u16,
    ) -> Result<bool, ViaProtocolError> {
        let [hi, lo] = keycode.to_be_bytes();
        let response = self.send(commands::DYNAMIC_KEYMAP_SET_KEYCODE, &[layer, row, col, hi, lo])?;
        Ok(response.success())
    }

    /// Keycode mapped to one rotation direction of an encoder.
    pub fn encoder_mapping(
        &mut self,
        layer: u8,
        encoder: u8,
        clockwise: bool,
    ) -> Result<Option<u16>, ViaProtocolError> {
        let response = self.send(
            commands::DYNAMIC_KEYMAP_GET_ENCODER,
            &[layer, encoder, clockwise as u8],
        )?;
        Ok(response.success().then(|| response.keycode()))
    }

    /// Map one rotation direction of an encoder to a keycode.
    pub fn set_encoder_mapping(
        &mut self,
        layer: u8,
        encoder: u8,
        clockwise: bool,
        keycode: u16,
    ) -> Result<bool, ViaProtocolError> {
        let [hi, lo] = keycode.to_be_bytes();
        let response = self.send(
            commands::DYNAMIC_KEYMAP_SET_ENCODER,
            &[layer, encoder, clockwise as u8, hi, lo],
        )?;
        Ok(response.success())
    }

    /// Read every encoder mapping across a layer/encoder grid.
    pub fn all_encoder_mappings(
        &mut self,
        layers: u8,
        encoders: u8,
    ) -> Result<Vec<EncoderMapping>, ViaProtocolError> {
        let mut mappings = Vec::with_capacity(layers as usize * encoders as usize);
        for layer in 0..layers {
            for encoder in 0..encoders {
                let counter_clockwise = self.encoder_mapping(layer, encoder, false)?;
                let clockwise = self.encoder_mapping(layer, encoder, true)?;
                mappings.push(EncoderMapping {
                    layer,
                    encoder,
                    clockwise,
                    counter_clockwise,
                });
            }
        }
        Ok(mappings)
    }

    /// Write back mappings captured by [`ViaSession::all_encoder_mappings`].
    ///
    /// Each direction is an independent write with no rollback; a rejected
    /// write is logged and the remaining entries are still attempted.
    pub fn restore_encoder_mappings(
        &mut self,
        mappings: &[EncoderMapping],
    ) -> Result<(), ViaProtocolError> {
        for mapping in mappings {
            if let Some(keycode) = mapping.counter_clockwise {
                if !self.set_encoder_mapping(mapping.layer, mapping.encoder, false, keycode)? {
                    warn!(
                        layer = mapping.layer,
                        encoder = mapping.encoder,
                        "counter-clockwise mapping restore rejected"
                    );
                }
            }
            if let Some(keycode) = mapping.clockwise {
                if !self.set_encoder_mapping(mapping.layer, mapping.encoder, true, keycode)? {
                    warn!(
                        layer = mapping.layer,
                        encoder = mapping.encoder,
                        "clockwise mapping restore rejected"
                    );
                }
            }
        }
        Ok(())
    }

    /// Value pair stored under an RGB matrix value id, or `None` on refusal.
    pub fn lighting_value(&mut self, value_id: u8) -> Result<Option<(u8, u8)>, ViaProtocolError> {
        let response = self.send(commands::CUSTOM_MENU_GET_VALUE, &[rgb::CHANNEL, value_id])?;
        Ok(response.success().then(|| response.value_pair()))
    }

    /// Store a value pair under an RGB matrix value id.
    pub fn set_lighting_value(
        &mut self,
        value_id: u8,
        value1: u8,
        value2: u8,
    ) -> Result<bool, ViaProtocolError> {
        let response = self.send(
            commands::CUSTOM_MENU_SET_VALUE,
            &[rgb::CHANNEL, value_id, value1, value2],
        )?;
        Ok(response.success())
    }

    /// Read the full lighting state, one value id at a time.
    ///
    /// The device has no atomic whole-state read; a refused field is left
    /// `None` and the rest are still collected.
    pub fn rgb_state(&mut self) -> Result<RgbState, ViaProtocolError> {
        let brightness = self.lighting_value(rgb::BRIGHTNESS)?;
        let effect = self.lighting_value(rgb::EFFECT)?;
        let effect_speed = self.lighting_value(rgb::EFFECT_SPEED)?;
        let color = self.lighting_value(rgb::COLOR)?;
        Ok(RgbState {
            brightness: brightness.map(|(v1, _)| v1),
            effect: effect.map(|(v1, _)| v1),
            effect_speed: effect_speed.map(|(v1, _)| v1),
            hue: color.map(|(v1, _)| v1),
            saturation: color.map(|(_, v2)| v2),
        })
    }

    /// Apply the populated fields of `state` as sequential single-value
    /// writes, in the order effect, color, brightness, speed.
    ///
    /// Interruption mid-way leaves a partial state on the device; callers
    /// own that risk.
    pub fn set_rgb_state(&mut self, state: &RgbState) -> Result<(), ViaProtocolError> {
        if let Some(effect) = state.effect {
            if !self.set_lighting_value(rgb::EFFECT, effect, 0)? {
                warn!("effect write rejected");
            }
        }
        if let (Some(hue), Some(saturation)) = (state.hue, state.saturation) {
            if !self.set_lighting_value(rgb::COLOR, hue, saturation)? {
                warn!("color write rejected");
            }
        }
        if let Some(brightness) = state.brightness {
            if !self.set_lighting_value(rgb::BRIGHTNESS, brightness, 0)? {
                warn!("brightness write rejected");
            }
        }
        if let Some(speed) = state.effect_speed {
            if !self.set_lighting_value(rgb::EFFECT_SPEED, speed, 0)? {
                warn!("effect speed write rejected");
            }
        }
        Ok(())
    }

    /// Persist the current lighting state to the device's own storage.
    pub fn save_rgb(&mut self) -> Result<bool, ViaProtocolError> {
        let response = self.send(commands::CUSTOM_MENU_SAVE, &[])?;
        Ok(response.success())
    }
}

pub mod mock {
    //! In-memory transport doubles for session and dispatcher tests.

    use super::*;
    use crate::ids::{REPORT_SIZE, offsets};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted transport: records writes, replays queued responses in order.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        pub writes: Vec<Vec<u8>>,
        pub responses: std::collections::VecDeque<Option<Vec<u8>>>,
    }

    impl ScriptedTransport {
        pub fn respond_with(responses: impl IntoIterator<Item = Option<Vec<u8>>>) -> Self {
            Self {
                writes: Vec::new(),
                responses: responses.into_iter().collect(),
            }
        }
    }

    impl ViaTransport for ScriptedTransport {
        fn write_report(&mut self, data: &[u8]) -> Result<(), ViaProtocolError> {
            self.writes.push(data.to_vec());
            Ok(())
        }

        fn read_timeout(&mut self, _timeout_ms: u64) -> Result<Option<Vec<u8>>, ViaProtocolError> {
            Ok(self.responses.pop_front().flatten())
        }
    }

    #[derive(Debug, Default)]
    struct EchoState {
        encoders: HashMap<(u8, u8, bool), u16>,
        keycodes: HashMap<(u8, u8, u8), u16>,
        lighting: HashMap<u8, (u8, u8)>,
        command_log: Vec<u8>,
        saves: u32,
        respond: bool,
    }

    /// Stateful device double: stores encoder mappings and lighting values
    /// and answers commands the way the firmware does.
    ///
    /// Clones share device state but keep their own pending response, so
    /// several sessions can run against one device.
    #[derive(Debug, Clone)]
    pub struct EchoDevice {
        state: Arc<Mutex<EchoState>>,
        pending: Option<Vec<u8>>,
    }

    impl Default for EchoDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EchoDevice {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(EchoState {
                    respond: true,
                    ..EchoState::default()
                })),
                pending: None,
            }
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, EchoState> {
            self.state.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Stop answering commands; every exchange then times out.
        pub fn go_silent(&self) {
            self.lock().respond = false;
        }

        pub fn seed_lighting(&self, value_id: u8, value1: u8, value2: u8) {
            self.lock().lighting.insert(value_id, (value1, value2));
        }

        pub fn lighting(&self, value_id: u8) -> Option<(u8, u8)> {
            self.lock().lighting.get(&value_id).copied()
        }

        pub fn command_count(&self) -> usize {
            self.lock().command_log.len()
        }

        /// Commands received so far whose id matches `command`.
        pub fn commands_seen(&self, command: u8) -> usize {
            self.lock()
                .command_log
                .iter()
                .filter(|&&c| c == command)
                .count()
        }

        pub fn save_count(&self) -> u32 {
            self.lock().saves
        }

        fn answer(state: &mut EchoState, command: u8, params: &[u8]) -> Vec<u8> {
            let mut body = vec![0u8; REPORT_SIZE];
            body[0] = command;
            let echoed = params.len().min(REPORT_SIZE - 1);
            body[1..1 + echoed].copy_from_slice(&params[..echoed]);
            match command {
                commands::GET_PROTOCOL_VERSION => {
                    body[1] = 0x00;
                    body[2] = 0x0C;
                }
                commands::DYNAMIC_KEYMAP_GET_KEYCODE => {
                    let key = (params[0], params[1], params[2]);
                    let keycode = state.keycodes.get(&key).copied().unwrap_or(0);
                    body[offsets::KEYCODE..offsets::KEYCODE + 2]
                        .copy_from_slice(&keycode.to_be_bytes());
                }
                commands::DYNAMIC_KEYMAP_SET_KEYCODE => {
                    let key = (params[0], params[1], params[2]);
                    state
                        .keycodes
                        .insert(key, u16::from_be_bytes([params[3], params[4]]));
                }
                commands::DYNAMIC_KEYMAP_GET_ENCODER => {
                    let key = (params[0], params[1], params[2] != 0);
                    let keycode = state.encoders.get(&key).copied().unwrap_or(0);
                    body[offsets::KEYCODE..offsets::KEYCODE + 2]
                        .copy_from_slice(&keycode.to_be_bytes());
                }
                commands::DYNAMIC_KEYMAP_SET_ENCODER => {
                    let key = (params[0], params[1], params[2] != 0);
                    state
                        .encoders
                        .insert(key, u16::from_be_bytes([params[3], params[4]]));
                }
                commands::CUSTOM_MENU_GET_VALUE => {
                    let (value1, value2) = state.lighting.get(&params[1]).copied().unwrap_or((0, 0));
                    body[offsets::VALUE1] = value1;
                    body[offsets::VALUE2] = value2;
                }
                commands::CUSTOM_MENU_SET_VALUE => {
                    state.lighting.insert(params[1], (params[2], params[3]));
                }
                commands::CUSTOM_MENU_SAVE => {
                    state.saves += 1;
                }
                _ => {
                    // Unknown command: firmware echoes nothing recognizable.
                    body[0] = 0xFF;
                }
            }
            body
        }
    }

    impl ViaTransport for EchoDevice {
        fn write_report(&mut self, data: &[u8]) -> Result<(), ViaProtocolError> {
            // data[0] is the report selector; the command starts at 1.
            let command = data[1];
            let params = &data[2..];
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.command_log.push(command);
            self.pending = state
                .respond
                .then(|| Self::answer(&mut state, command, params));
            Ok(())
        }

        fn read_timeout(&mut self, _timeout_ms: u64) -> Result<Option<Vec<u8>>, ViaProtocolError> {
            Ok(self.pending.take())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{EchoDevice, ScriptedTransport};
    use super::*;
    use crate::ids::REPORT_SIZE;

    #[test]
    fn test_send_times_out_when_device_is_silent() {
        let device = EchoDevice::new();
        device.go_silent();
        let mut session = ViaSession::with_timeout(device, 5);
        let err = session.send(commands::GET_PROTOCOL_VERSION, &[]).expect_err("must time out");
        assert!(matches!(err, ViaProtocolError::Timeout { timeout_ms: 5 }));
    }

    #[test]
    fn test_send_on_closed_session_fails() {
        let mut session = ViaSession::new(EchoDevice::new());
        session.close();
        assert!(session.send(commands::CUSTOM_MENU_SAVE, &[]).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = ViaSession::new(EchoDevice::new());
        assert!(session.is_open());
        session.close();
        session.close();
        assert!(!session.is_open());
    }

    #[test]
    fn test_protocol_version_round_trip() {
        let mut session = ViaSession::new(EchoDevice::new());
        let version = session.protocol_version().expect("exchange");
        assert_eq!(version, Some(0x000C));
    }

    #[test]
    fn test_keycode_set_then_get() {
        let mut session = ViaSession::new(EchoDevice::new());
        assert!(session.set_keycode(0, 2, 3, 0x0041).expect("set"));
        assert_eq!(session.keycode(0, 2, 3).expect("get"), Some(0x0041));
        assert_eq!(session.keycode(1, 2, 3).expect("get"), Some(0));
    }

    #[test]
    fn test_encoder_mapping_directions_are_independent() {
        let mut session = ViaSession::new(EchoDevice::new());
        assert!(session.set_encoder_mapping(0, 1, true, 0x00A5).expect("set cw"));
        assert!(session.set_encoder_mapping(0, 1, false, 0x00A6).expect("set ccw"));
        assert_eq!(session.encoder_mapping(0, 1, true).expect("get"), Some(0x00A5));
        assert_eq!(session.encoder_mapping(0, 1, false).expect("get"), Some(0x00A6));
    }

    #[test]
    fn test_all_encoder_mappings_walks_the_grid() {
        let mut session = ViaSession::new(EchoDevice::new());
        session.set_encoder_mapping(1, 2, true, 0x0042).expect("seed");
        let mappings = session.all_encoder_mappings(2, 3).expect("capture");
        assert_eq!(mappings.len(), 6);
        let hit = mappings
            .iter()
            .find(|m| m.layer == 1 && m.encoder == 2)
            .expect("captured entry");
        assert_eq!(hit.clockwise, Some(0x0042));
    }

    #[test]
    fn test_restore_encoder_mappings_writes_back() {
        let device = EchoDevice::new();
        let mut session = ViaSession::new(device.clone());
        let mappings = [EncoderMapping {
            layer: 0,
            encoder: 0,
            clockwise: Some(0x0010),
            counter_clockwise: None,
        }];
        session.restore_encoder_mappings(&mappings).expect("restore");
        assert_eq!(session.encoder_mapping(0, 0, true).expect("get"), Some(0x0010));
        // The None direction was never written.
        assert_eq!(device.commands_seen(commands::DYNAMIC_KEYMAP_SET_ENCODER), 1);
    }

    #[test]
    fn test_rgb_state_reads_all_value_ids() {
        let device = EchoDevice::new();
        device.seed_lighting(rgb::BRIGHTNESS, 180, 0);
        device.seed_lighting(rgb::EFFECT, 2, 0);
        device.seed_lighting(rgb::EFFECT_SPEED, 7, 0);
        device.seed_lighting(rgb::COLOR, 100, 255);
        let mut session = ViaSession::new(device);
        let state = session.rgb_state().expect("read");
        assert_eq!(
            state,
            RgbState {
                brightness: Some(180),
                effect: Some(2),
                effect_speed: Some(7),
                hue: Some(100),
                saturation: Some(255),
            }
        );
    }

    #[test]
    fn test_set_rgb_state_skips_unpopulated_fields() {
        let device = EchoDevice::new();
        let mut session = ViaSession::new(device.clone());
        session
            .set_rgb_state(&RgbState {
                hue: Some(42),
                saturation: Some(200),
                ..RgbState::default()
            })
            .expect("apply");
        assert_eq!(device.lighting(rgb::COLOR), Some((42, 200)));
        assert_eq!(device.lighting(rgb::BRIGHTNESS), None);
        assert_eq!(device.commands_seen(commands::CUSTOM_MENU_SET_VALUE), 1);
    }

    #[test]
    fn test_save_rgb_round_trip() {
        let device = EchoDevice::new();
        let mut session = ViaSession::new(device.clone());
        assert!(session.save_rgb().expect("save"));
        assert_eq!(device.save_count(), 1);
    }

    #[test]
    fn test_failure_response_maps_to_none() {
        // Unknown command ids answer with a non-echoing first byte.
        let mut transport = ScriptedTransport::default();
        let mut raw = vec![0u8; REPORT_SIZE];
        raw[0] = 0xFF;
        transport.responses.push_back(Some(raw));
        let mut session = ViaSession::new(transport);
        let response = session.send(commands::CUSTOM_MENU_GET_VALUE, &[3, 1]).expect("decode");
        assert!(!response.success());
    }
}
