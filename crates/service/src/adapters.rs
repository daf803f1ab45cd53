//! Port implementations wiring the engine to its real collaborators.

use async_trait::async_trait;
use hidapi::HidApi;
use huedeck_backup::{BackupStore, SessionLock, Snapshot};
use huedeck_engine::{BackupPort, BoxError, DevicePort, LightService, LightStatus};
use huedeck_hid_common::{HidTransport, open_control_session, open_interface};
use huedeck_hid_via_protocol::ids::CONSUMER_USAGE_PAGE;
use huedeck_hid_via_protocol::{RgbState, ViaSession};
use huedeck_hue::HueBridge;
use std::sync::Mutex;

/// [`LightService`] over the Hue bridge REST client.
pub struct BridgeLightService {
    bridge: HueBridge,
}

impl BridgeLightService {
    pub fn new(bridge: HueBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl LightService for BridgeLightService {
    async fn light_status(&self, light_id: &str) -> Result<LightStatus, BoxError> {
        let light = self.bridge.light(light_id).await?;
        Ok(LightStatus {
            hue: light.state.hue.unwrap_or(0) as u32,
            brightness: light.state.bri.unwrap_or(127),
        })
    }

    async fn enable_color_mode(&self, light_id: &str) -> Result<(), BoxError> {
        self.bridge.enable_color_mode(light_id).await?;
        Ok(())
    }

    async fn set_hue(&self, light_id: &str, hue: i64) -> Result<(), BoxError> {
        self.bridge.set_hue(light_id, hue).await?;
        Ok(())
    }

    async fn set_brightness_multiple(
        &self,
        light_ids: &[String],
        brightness: i64,
    ) -> Result<(), BoxError> {
        self.bridge
            .set_brightness_multiple(light_ids, brightness)
            .await?;
        Ok(())
    }
}

/// [`BackupPort`] over the on-disk store, holding the instance lock for
/// the session's lifetime.
pub struct FileBackupPort {
    store: BackupStore,
    lock: Mutex<Option<SessionLock>>,
}

impl FileBackupPort {
    pub fn new(store: BackupStore) -> Self {
        Self {
            store,
            lock: Mutex::new(None),
        }
    }
}

impl BackupPort for FileBackupPort {
    fn save_rotating(&self, rgb: &RgbState) -> Result<(), BoxError> {
        self.store.save_rotating(&Snapshot::now(*rgb))?;
        Ok(())
    }

    fn save_session(&self, rgb: &RgbState) -> Result<(), BoxError> {
        self.store.save_session(&Snapshot::now(*rgb))?;
        Ok(())
    }

    fn load_session(&self) -> Option<RgbState> {
        self.store.load_session().map(|snapshot| snapshot.rgb)
    }

    fn clear_session(&self) -> Result<(), BoxError> {
        self.store.clear_session()?;
        Ok(())
    }

    fn acquire_lock(&self) -> Result<(), BoxError> {
        let lock = self.store.acquire_lock()?;
        *self.lock.lock().unwrap_or_else(|e| e.into_inner()) = Some(lock);
        Ok(())
    }

    fn release_lock(&self) {
        if let Some(lock) = self.lock.lock().unwrap_or_else(|e| e.into_inner()).take() {
            lock.release();
        }
    }
}

/// [`DevicePort`] over hidapi, re-enumerating on every open so a replugged
/// device is found again.
pub struct UsbDevicePort {
    api: Mutex<HidApi>,
}

impl UsbDevicePort {
    pub fn new() -> Result<Self, BoxError> {
        Ok(Self {
            api: Mutex::new(HidApi::new()?),
        })
    }

    /// Open the consumer-control interface that carries raw knob reports.
    pub fn open_input_interface(&self) -> Result<HidTransport, BoxError> {
        let mut api = self.api.lock().unwrap_or_else(|e| e.into_inner());
        api.refresh_devices()?;
        Ok(open_interface(&api, CONSUMER_USAGE_PAGE)?)
    }
}

impl DevicePort for UsbDevicePort {
    type Transport = HidTransport;

    fn open_session(&self) -> Result<ViaSession<HidTransport>, BoxError> {
        let mut api = self.api.lock().unwrap_or_else(|e| e.into_inner());
        api.refresh_devices()?;
        Ok(open_control_session(&api)?)
    }
}
