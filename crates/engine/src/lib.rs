//! Knob event dispatch and session lifecycle.
//!
//! The engine owns everything between a raw input report and the calls to
//! external collaborators: classification, debouncing, the in-memory light
//! model, flash feedback on the device, and the capture/override/listen/
//! restore state machine. External collaborators are reached through the
//! port traits in [`ports`], so the whole engine runs against in-memory
//! doubles in tests.

pub mod debounce;
pub mod flash;
pub mod input;
pub mod lights;
pub mod ports;
pub mod session;

pub use debounce::{DEBOUNCE_INTERVAL, DebounceFilter, EventKey};
pub use flash::{FLASH_DURATION, FlashFeedback, keyboard_hue};
pub use input::{BRIGHTNESS_STEP, HUE_STEP, KnobAction, KnobId, KnobMap};
pub use lights::{LightModel, clamp_brightness, wrap_hue};
pub use ports::{BackupPort, BoxError, DevicePort, LightService, LightStatus};
pub use session::{
    CONTROL_MODE_RGB, LightAssignment, SessionController, SessionError, SessionPhase,
};
