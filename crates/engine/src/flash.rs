//! Transient device-color feedback with a deferred, cancellable revert.
//!
//! Flash feedback paints the knob's current light color onto the device
//! for a moment, then reverts to the control-mode color. At most one
//! revert is pending; a new trigger cancels and replaces it, so rapid knob
//! motion shows only the latest color instead of a queued flicker
//! sequence. The whole path is cosmetic: every failure is swallowed.

use crate::ports::DevicePort;
use huedeck_hid_via_protocol::{RgbState, ViaSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long a flashed color stays before reverting.
pub const FLASH_DURATION: Duration = Duration::from_millis(200);

/// Saturation used for flashed colors.
const FLASH_SATURATION: u8 = 255;

/// Scale a light hue (0..=65535) onto the device's 0..=255 hue wheel.
pub fn keyboard_hue(light_hue: u32) -> u8 {
    (((light_hue % 65536) * 255 + 32767) / 65535) as u8
}

/// The flash session plus the generation stamp guarding late reverts.
///
/// Each trigger bumps the generation under the lock; a revert task that
/// outlived its cancellation compares stamps under the same lock and
/// backs off, so an old timer can never overwrite a newer color.
struct FlashSlot<T: huedeck_hid_via_protocol::ViaTransport> {
    session: Option<ViaSession<T>>,
    generation: u64,
}

/// Drives the flash sub-protocol on its own device session.
///
/// The session opens lazily on the first trigger and stays open for the
/// rest of the listening phase, independent of the control lifecycle's
/// open/close cycles.
pub struct FlashFeedback<D: DevicePort> {
    port: Arc<D>,
    revert_color: RgbState,
    duration: Duration,
    slot: Arc<Mutex<FlashSlot<D::Transport>>>,
    revert: Option<JoinHandle<()>>,
}

impl<D: DevicePort> FlashFeedback<D> {
    pub fn new(port: Arc<D>, revert_color: RgbState) -> Self {
        Self::with_duration(port, revert_color, FLASH_DURATION)
    }

    pub fn with_duration(port: Arc<D>, revert_color: RgbState, duration: Duration) -> Self {
        Self {
            port,
            revert_color,
            duration,
            slot: Arc::new(Mutex::new(FlashSlot {
                session: None,
                generation: 0,
            })),
            revert: None,
        }
    }

    /// Flash the device to `light_hue`'s keyboard-scale color, then revert
    /// after the flash duration.
    pub async fn trigger(&mut self, light_hue: u32) {
        let hue = keyboard_hue(light_hue);
        let generation;
        {
            let mut slot = self.slot.lock().await;
            if slot.session.is_none() {
                match self.port.open_session() {
                    Ok(session) => slot.session = Some(session),
                    Err(e) => {
                        debug!("flash session open failed: {e}");
                        return;
                    }
                }
            }
            slot.generation += 1;
            generation = slot.generation;
            if let Some(session) = slot.session.as_mut() {
                let color = RgbState {
                    hue: Some(hue),
                    saturation: Some(FLASH_SATURATION),
                    ..RgbState::default()
                };
                if let Err(e) = session.set_rgb_state(&color) {
                    debug!("flash color set failed: {e}");
                }
            }
        }

        if let Some(pending) = self.revert.take() {
            pending.abort();
        }
        let slot = Arc::clone(&self.slot);
        let revert_to = RgbState {
            hue: self.revert_color.hue,
            saturation: self.revert_color.saturation,
            ..RgbState::default()
        };
        let duration = self.duration;
        self.revert = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut slot = slot.lock().await;
            if slot.generation != generation {
                // A newer flash superseded this revert while it slept.
                return;
            }
            if let Some(session) = slot.session.as_mut() {
                if let Err(e) = session.set_rgb_state(&revert_to) {
                    debug!("flash revert failed: {e}");
                }
            }
        }));
    }

    /// Cancel any pending revert and close the flash session.
    pub async fn shutdown(&mut self) {
        if let Some(pending) = self.revert.take() {
            pending.abort();
        }
        let mut slot = self.slot.lock().await;
        slot.generation += 1;
        if let Some(mut session) = slot.session.take() {
            session.close();
        }
    }
}
