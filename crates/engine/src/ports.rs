//! Port traits for the engine's external collaborators.
//!
//! These traits are the engine's only view of the light service, the
//! backup store, and the physical device. Implementations live with the
//! infrastructure they wrap; in-memory doubles live in [`mock`] so every
//! lifecycle path can run in tests.

use async_trait::async_trait;
use huedeck_hid_via_protocol::{RgbState, ViaSession, ViaTransport};

/// Boxed error carried across a port boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reported state of one light, as needed to seed the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightStatus {
    pub hue: u32,
    pub brightness: u8,
}

/// Asynchronous light state mutation API.
///
/// Calls may fail independently per light; failures come back as error
/// values, never panics.
#[async_trait]
pub trait LightService: Send + Sync + 'static {
    async fn light_status(&self, light_id: &str) -> Result<LightStatus, BoxError>;

    /// Turn the light on with full saturation so hue changes are visible.
    async fn enable_color_mode(&self, light_id: &str) -> Result<(), BoxError>;

    /// Set a light's hue; the implementation normalizes into range.
    async fn set_hue(&self, light_id: &str, hue: i64) -> Result<(), BoxError>;

    /// Set the same brightness on several lights; the implementation
    /// clamps into range.
    async fn set_brightness_multiple(
        &self,
        light_ids: &[String],
        brightness: i64,
    ) -> Result<(), BoxError>;
}

/// Persistence of the pre-session device state.
pub trait BackupPort: Send + Sync + 'static {
    /// Append a rotating historical snapshot.
    fn save_rotating(&self, rgb: &RgbState) -> Result<(), BoxError>;

    /// Persist the crash-recovery copy for the current session.
    fn save_session(&self, rgb: &RgbState) -> Result<(), BoxError>;

    /// Load the crash-recovery copy; read failures read as absent.
    fn load_session(&self) -> Option<RgbState>;

    /// Remove the crash-recovery copy.
    fn clear_session(&self) -> Result<(), BoxError>;

    /// Take the single-instance session lock.
    fn acquire_lock(&self) -> Result<(), BoxError>;

    /// Give the lock back; failures only get logged downstream.
    fn release_lock(&self);
}

/// Opens command sessions on the physical device.
///
/// The control lifecycle and flash feedback each open their own session,
/// so the two never contend for one half-duplex handle.
pub trait DevicePort: Send + Sync + 'static {
    type Transport: ViaTransport + Send + 'static;

    fn open_session(&self) -> Result<ViaSession<Self::Transport>, BoxError>;
}

pub mod mock {
    //! In-memory collaborators for lifecycle tests.

    use super::*;
    use huedeck_hid_via_protocol::session::mock::EchoDevice;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn poisoned<T>(e: std::sync::PoisonError<T>) -> T {
        e.into_inner()
    }

    /// Records every call; optionally fails on demand.
    #[derive(Debug, Default)]
    pub struct MockLightService {
        statuses: Mutex<HashMap<String, LightStatus>>,
        pub hue_calls: Mutex<Vec<(String, i64)>>,
        pub brightness_calls: Mutex<Vec<(Vec<String>, i64)>>,
        pub color_mode_calls: Mutex<Vec<String>>,
        fail_status: AtomicBool,
        fail_updates: AtomicBool,
    }

    impl MockLightService {
        pub fn with_status(self, light_id: &str, status: LightStatus) -> Self {
            self.statuses
                .lock()
                .unwrap_or_else(poisoned)
                .insert(light_id.to_string(), status);
            self
        }

        pub fn fail_status_reads(&self) {
            self.fail_status.store(true, Ordering::SeqCst);
        }

        pub fn fail_updates(&self) {
            self.fail_updates.store(true, Ordering::SeqCst);
        }

        pub fn hue_calls(&self) -> Vec<(String, i64)> {
            self.hue_calls.lock().unwrap_or_else(poisoned).clone()
        }

        pub fn brightness_calls(&self) -> Vec<(Vec<String>, i64)> {
            self.brightness_calls.lock().unwrap_or_else(poisoned).clone()
        }

        pub fn color_mode_calls(&self) -> Vec<String> {
            self.color_mode_calls.lock().unwrap_or_else(poisoned).clone()
        }
    }

    #[async_trait]
    impl LightService for MockLightService {
        async fn light_status(&self, light_id: &str) -> Result<LightStatus, BoxError> {
            if self.fail_status.load(Ordering::SeqCst) {
                return Err("status read refused".into());
            }
            self.statuses
                .lock()
                .unwrap_or_else(poisoned)
                .get(light_id)
                .copied()
                .ok_or_else(|| format!("unknown light {light_id}").into())
        }

        async fn enable_color_mode(&self, light_id: &str) -> Result<(), BoxError> {
            if self.fail_status.load(Ordering::SeqCst) {
                return Err("color mode refused".into());
            }
            self.color_mode_calls
                .lock()
                .unwrap_or_else(poisoned)
                .push(light_id.to_string());
            Ok(())
        }

        async fn set_hue(&self, light_id: &str, hue: i64) -> Result<(), BoxError> {
            self.hue_calls
                .lock()
                .unwrap_or_else(poisoned)
                .push((light_id.to_string(), hue));
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err("hue update refused".into());
            }
            Ok(())
        }

        async fn set_brightness_multiple(
            &self,
            light_ids: &[String],
            brightness: i64,
        ) -> Result<(), BoxError> {
            self.brightness_calls
                .lock()
                .unwrap_or_else(poisoned)
                .push((light_ids.to_vec(), brightness));
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err("brightness update refused".into());
            }
            Ok(())
        }
    }

    /// Holds the session copy in memory and counts every operation.
    #[derive(Debug, Default)]
    pub struct MockBackup {
        session: Mutex<Option<RgbState>>,
        pub rotating_saves: AtomicUsize,
        pub session_saves: AtomicUsize,
        pub clears: AtomicUsize,
        pub lock_acquisitions: AtomicUsize,
        pub lock_releases: AtomicUsize,
        locked: AtomicBool,
    }

    impl MockBackup {
        pub fn session_copy(&self) -> Option<RgbState> {
            *self.session.lock().unwrap_or_else(poisoned)
        }

        pub fn clear_count(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }
    }

    impl BackupPort for MockBackup {
        fn save_rotating(&self, _rgb: &RgbState) -> Result<(), BoxError> {
            self.rotating_saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn save_session(&self, rgb: &RgbState) -> Result<(), BoxError> {
            self.session_saves.fetch_add(1, Ordering::SeqCst);
            *self.session.lock().unwrap_or_else(poisoned) = Some(*rgb);
            Ok(())
        }

        fn load_session(&self) -> Option<RgbState> {
            *self.session.lock().unwrap_or_else(poisoned)
        }

        fn clear_session(&self) -> Result<(), BoxError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            *self.session.lock().unwrap_or_else(poisoned) = None;
            Ok(())
        }

        fn acquire_lock(&self) -> Result<(), BoxError> {
            if self.locked.swap(true, Ordering::SeqCst) {
                return Err("session lock already held".into());
            }
            self.lock_acquisitions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release_lock(&self) {
            self.locked.store(false, Ordering::SeqCst);
            self.lock_releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Hands out sessions over one shared [`EchoDevice`].
    #[derive(Debug)]
    pub struct MockDevicePort {
        device: EchoDevice,
        pub opens: AtomicUsize,
        absent: AtomicBool,
    }

    impl MockDevicePort {
        pub fn new(device: EchoDevice) -> Self {
            Self {
                device,
                opens: AtomicUsize::new(0),
                absent: AtomicBool::new(false),
            }
        }

        /// Simulate the device being unplugged.
        pub fn set_absent(&self) {
            self.absent.store(true, Ordering::SeqCst);
        }

        pub fn open_count(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        pub fn device(&self) -> &EchoDevice {
            &self.device
        }
    }

    impl DevicePort for MockDevicePort {
        type Transport = EchoDevice;

        fn open_session(&self) -> Result<ViaSession<EchoDevice>, BoxError> {
            if self.absent.load(Ordering::SeqCst) {
                return Err("device interface not found".into());
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(ViaSession::new(self.device.clone()))
        }
    }
}
