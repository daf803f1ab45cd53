//! Raw-report-to-knob-action classification.
//!
//! The mapping from report identity to logical knob is a data table, not
//! control flow: rewiring a knob means editing [`KnobMap::kb16`], nothing
//! else.

use huedeck_hid_via_protocol::RawEvent;

/// Logical knob identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnobId {
    Knob1,
    Knob2,
}

/// Semantically classified knob action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobAction {
    /// Rotate one light's hue by a signed wheel step.
    AdjustHue { knob: KnobId, delta: i32 },
    /// Rotate the shared brightness by a signed step.
    AdjustBrightness { delta: i32 },
    /// Release events, unmatched identities, noise.
    Ignore,
}

/// Hue step per detent, out of the 65536-value hue circle.
pub const HUE_STEP: i32 = 1000;
/// Brightness step per detent, out of the 1..=254 range.
pub const BRIGHTNESS_STEP: i32 = 20;

/// What one (family, code) pair drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobTarget {
    /// Hue step in a fixed direction; the code byte itself is the
    /// direction (the simple two-state report family).
    HueStep { knob: KnobId, sign: i32 },
    /// Hue step with direction from the rotation byte.
    HueRotation { knob: KnobId },
    /// Shared brightness step from the rotation byte, optionally with the
    /// direction inverted relative to the raw rotation.
    BrightnessRotation { inverted: bool },
}

/// One row of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnobBinding {
    pub family: u8,
    pub code: u8,
    pub target: KnobTarget,
}

/// Data-driven mapping from report identity to knob actions.
#[derive(Debug, Clone)]
pub struct KnobMap {
    bindings: Vec<KnobBinding>,
    hue_step: i32,
    brightness_step: i32,
}

impl Default for KnobMap {
    fn default() -> Self {
        Self::kb16()
    }
}

impl KnobMap {
    /// Layout observed on the DOIO KB16: the volume report family carries
    /// knob 1 (direction in the code byte), the app-control family carries
    /// knob 2 and the big brightness knob (direction in the rotation byte,
    /// brightness inverted by design).
    pub fn kb16() -> Self {
        Self::new(
            vec![
                KnobBinding {
                    family: 0x04,
                    code: 0xE9,
                    target: KnobTarget::HueStep {
                        knob: KnobId::Knob1,
                        sign: 1,
                    },
                },
                KnobBinding {
                    family: 0x04,
                    code: 0xEA,
                    target: KnobTarget::HueStep {
                        knob: KnobId::Knob1,
                        sign: -1,
                    },
                },
                KnobBinding {
                    family: 0x06,
                    code: 0x0A,
                    target: KnobTarget::HueRotation { knob: KnobId::Knob2 },
                },
                KnobBinding {
                    family: 0x06,
                    code: 0x03,
                    target: KnobTarget::BrightnessRotation { inverted: true },
                },
            ],
            HUE_STEP,
            BRIGHTNESS_STEP,
        )
    }

    pub fn new(bindings: Vec<KnobBinding>, hue_step: i32, brightness_step: i32) -> Self {
        Self {
            bindings,
            hue_step,
            brightness_step,
        }
    }

    /// Classify one parsed report.
    ///
    /// A zero code is a release; unmatched identities and unrecognized
    /// rotation bytes are noise. Both classify as [`KnobAction::Ignore`].
    pub fn classify(&self, event: &RawEvent) -> KnobAction {
        if event.code == 0 {
            return KnobAction::Ignore;
        }
        let Some(binding) = self
            .bindings
            .iter()
            .find(|b| b.family == event.family && b.code == event.code)
        else {
            return KnobAction::Ignore;
        };
        match binding.target {
            KnobTarget::HueStep { knob, sign } => KnobAction::AdjustHue {
                knob,
                delta: sign * self.hue_step,
            },
            KnobTarget::HueRotation { knob } => match event.rotation() {
                Some(rotation) => KnobAction::AdjustHue {
                    knob,
                    delta: rotation.sign() * self.hue_step,
                },
                None => KnobAction::Ignore,
            },
            KnobTarget::BrightnessRotation { inverted } => match event.rotation() {
                Some(rotation) => {
                    let sign = if inverted {
                        -rotation.sign()
                    } else {
                        rotation.sign()
                    };
                    KnobAction::AdjustBrightness {
                        delta: sign * self.brightness_step,
                    }
                }
                None => KnobAction::Ignore,
            },
        }
    }
}
