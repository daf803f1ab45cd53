//! Session lifecycle: initialize, capture, override, listen, restore.
//!
//! Phases run strictly forward. Any termination trigger forces the jump to
//! `Restoring` from whatever non-terminal phase is current, and an atomic
//! guard makes the restore side effects run exactly once no matter how
//! many shutdown sources fire.

use crate::debounce::{DebounceFilter, EventKey};
use crate::flash::FlashFeedback;
use crate::input::{KnobAction, KnobId, KnobMap};
use crate::lights::LightModel;
use crate::ports::{BackupPort, BoxError, DevicePort, LightService};
use huedeck_hid_via_protocol::{RawEvent, RgbState, ViaProtocolError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Control-mode color marking the device as captured: vivid purple on a
/// solid effect.
pub const CONTROL_MODE_RGB: RgbState = RgbState {
    brightness: Some(200),
    effect: Some(1),
    effect_speed: None,
    hue: Some(200),
    saturation: Some(255),
};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Capturing,
    Overriding,
    Listening,
    Restoring,
    Terminated,
}

/// Fatal session errors. Steady-state listening errors are logged and
/// contained, never raised through this type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("light service initialization failed: {0}")]
    LightInit(#[source] BoxError),

    #[error("device unavailable: {0}")]
    Device(#[source] BoxError),

    #[error("device protocol failure: {0}")]
    Protocol(#[from] ViaProtocolError),

    #[error("backup persistence failed: {0}")]
    Persistence(#[source] BoxError),
}

/// One controlled light and the knob that drives its hue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightAssignment {
    pub knob: KnobId,
    pub light_id: String,
}

/// Owns the session lifecycle and all mutable dispatch state.
///
/// Reports are handled strictly in arrival order on one stream; the only
/// concurrency is the fire-and-forget light service calls and the flash
/// revert timer, both of which live behind their own synchronization.
pub struct SessionController<D, L, B>
where
    D: DevicePort,
    L: LightService,
    B: BackupPort,
{
    device: Arc<D>,
    lights: Arc<L>,
    backup: Arc<B>,
    assignments: Vec<LightAssignment>,
    map: KnobMap,
    debounce: DebounceFilter,
    model: LightModel,
    flash: FlashFeedback<D>,
    phase: SessionPhase,
    restored: Arc<AtomicBool>,
}

impl<D, L, B> SessionController<D, L, B>
where
    D: DevicePort,
    L: LightService,
    B: BackupPort,
{
    pub fn new(
        device: Arc<D>,
        lights: Arc<L>,
        backup: Arc<B>,
        assignments: Vec<LightAssignment>,
    ) -> Self {
        let flash = FlashFeedback::new(Arc::clone(&device), CONTROL_MODE_RGB);
        Self {
            device,
            lights,
            backup,
            assignments,
            map: KnobMap::default(),
            debounce: DebounceFilter::default(),
            model: LightModel::new(),
            flash,
            phase: SessionPhase::Idle,
            restored: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Swap in a different classification table.
    pub fn with_knob_map(mut self, map: KnobMap) -> Self {
        self.map = map;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn model(&self) -> &LightModel {
        &self.model
    }

    /// Seed the model from live light state and force vivid color mode.
    ///
    /// Per-knob hues come straight from each light; the shared brightness
    /// is the average across all of them. Errors here are fatal: control
    /// cannot start without this baseline, and nothing has touched the
    /// device yet.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.phase = SessionPhase::Initializing;
        let mut brightness_sum: u32 = 0;
        for assignment in &self.assignments {
            let status = self
                .lights
                .light_status(&assignment.light_id)
                .await
                .map_err(SessionError::LightInit)?;
            self.model.seed_hue(assignment.knob, status.hue);
            brightness_sum += status.brightness as u32;
            self.lights
                .enable_color_mode(&assignment.light_id)
                .await
                .map_err(SessionError::LightInit)?;
        }
        if !self.assignments.is_empty() {
            // Rounded average, so an odd sum doesn't seed one unit dark.
            let count = self.assignments.len() as u32;
            self.model
                .seed_brightness(((brightness_sum + count / 2) / count) as u8);
        }
        info!(
            brightness = self.model.brightness(),
            "light model seeded from live state"
        );
        Ok(())
    }

    /// Snapshot the device's lighting state into the backup store.
    ///
    /// The store's copy is the authoritative one: it has to survive a
    /// process crash between here and the restore.
    pub async fn capture(&mut self) -> Result<(), SessionError> {
        self.phase = SessionPhase::Capturing;
        self.backup
            .acquire_lock()
            .map_err(SessionError::Persistence)?;
        let mut session = self.device.open_session().map_err(SessionError::Device)?;
        let rgb = session.rgb_state()?;
        session.close();
        self.backup
            .save_rotating(&rgb)
            .map_err(SessionError::Persistence)?;
        self.backup
            .save_session(&rgb)
            .map_err(SessionError::Persistence)?;
        info!(?rgb, "device lighting captured");
        Ok(())
    }

    /// Mark the device as captured with the control-mode color.
    pub async fn override_device(&mut self) -> Result<(), SessionError> {
        self.phase = SessionPhase::Overriding;
        let mut session = self.device.open_session().map_err(SessionError::Device)?;
        session.set_rgb_state(&CONTROL_MODE_RGB)?;
        session.close();
        info!("control mode color applied");
        Ok(())
    }

    /// Drain the ordered report stream until a shutdown trigger arrives or
    /// the stream ends.
    pub async fn listen(
        &mut self,
        mut reports: mpsc::Receiver<Vec<u8>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        self.phase = SessionPhase::Listening;
        info!("listening for knob events");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("shutdown requested");
                    break;
                }
                report = reports.recv() => match report {
                    Some(report) => self.handle_report(&report, Instant::now()).await,
                    None => {
                        warn!("report stream closed");
                        break;
                    }
                }
            }
        }
    }

    /// Decode, debounce, and dispatch one raw report.
    pub async fn handle_report(&mut self, report: &[u8], now: Instant) {
        let Some(event) = RawEvent::parse(report) else {
            return;
        };
        if event.code == 0 {
            // Release event.
            return;
        }
        if !self.debounce.admit(EventKey::from(&event), now) {
            return;
        }
        match self.map.classify(&event) {
            KnobAction::Ignore => {}
            KnobAction::AdjustHue { knob, delta } => self.adjust_hue(knob, delta).await,
            KnobAction::AdjustBrightness { delta } => self.adjust_brightness(delta).await,
        }
    }

    /// The model always updates; the service call is fire-and-forget so the
    /// next report is never blocked on the network.
    async fn adjust_hue(&mut self, knob: KnobId, delta: i32) {
        let hue = self.model.adjust_hue(knob, delta);
        debug!(?knob, hue, "hue adjusted");
        self.flash.trigger(hue).await;
        let Some(light_id) = self
            .assignments
            .iter()
            .find(|a| a.knob == knob)
            .map(|a| a.light_id.clone())
        else {
            return;
        };
        let lights = Arc::clone(&self.lights);
        tokio::spawn(async move {
            if let Err(e) = lights.set_hue(&light_id, hue as i64).await {
                warn!(light = %light_id, "hue update failed: {e}");
            }
        });
    }

    async fn adjust_brightness(&mut self, delta: i32) {
        let brightness = self.model.adjust_brightness(delta);
        debug!(brightness, "brightness adjusted");
        let light_ids: Vec<String> = self
            .assignments
            .iter()
            .map(|a| a.light_id.clone())
            .collect();
        let lights = Arc::clone(&self.lights);
        tokio::spawn(async move {
            if let Err(e) = lights.set_brightness_multiple(&light_ids, brightness as i64).await {
                warn!("brightness update failed: {e}");
            }
        });
    }

    /// Restore the device and reach `Terminated`.
    ///
    /// Guarded to run its side effects exactly once under concurrent
    /// triggers. Every error on this path is logged and swallowed: the
    /// process is exiting regardless, and a failed restore must not stop
    /// the rest of the teardown.
    pub async fn restore_and_terminate(&mut self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            debug!("restore already performed");
            return;
        }
        self.phase = SessionPhase::Restoring;
        self.flash.shutdown().await;
        match self.backup.load_session() {
            None => info!("no session backup present, nothing to restore"),
            Some(rgb) => {
                match self.device.open_session() {
                    Ok(mut session) => {
                        match session.set_rgb_state(&rgb) {
                            Ok(()) => info!("device lighting restored"),
                            Err(e) => warn!("device restore failed: {e}"),
                        }
                        session.close();
                    }
                    Err(e) => warn!("device reopen for restore failed: {e}"),
                }
                if let Err(e) = self.backup.clear_session() {
                    warn!("session backup clear failed: {e}");
                }
            }
        }
        self.backup.release_lock();
        self.phase = SessionPhase::Terminated;
        info!("session terminated");
    }
}
