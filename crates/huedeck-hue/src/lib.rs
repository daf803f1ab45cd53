//! Philips Hue bridge HTTP client.
//!
//! Thin wrapper over the bridge's REST API. State-setting calls normalize
//! values before transmission: hue wraps modulo its circular range,
//! brightness clamps into the interval the bridge accepts. The bridge
//! reports API failures inside a 200 response body, so every call decodes
//! the body and surfaces the first error it finds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Number of values on the bridge's hue circle (0..=65535).
pub const HUE_RANGE: i64 = 65536;
/// Lowest brightness the bridge accepts.
pub const BRIGHTNESS_MIN: i64 = 1;
/// Highest brightness the bridge accepts.
pub const BRIGHTNESS_MAX: i64 = 254;
/// Saturation pushed when forcing vivid color mode.
const VIVID_SATURATION: u8 = 254;

/// Light Service failures. Reported as values, never panics; per-light
/// failures during fan-out calls are independent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Transport-level failure reaching the bridge.
    #[error("bridge request failed: {0}")]
    Http(String),

    /// The bridge answered but rejected the call.
    #[error("bridge rejected the call: {0}")]
    Api(String),

    /// The bridge answered with a payload this client cannot read.
    #[error("unexpected bridge payload: {0}")]
    Decode(String),
}

/// Reported state of one light.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightAttributes {
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub bri: Option<u8>,
    #[serde(default)]
    pub hue: Option<u16>,
    #[serde(default)]
    pub sat: Option<u8>,
}

/// One light as returned by the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Light {
    pub state: LightAttributes,
    #[serde(default)]
    pub name: String,
}

/// Partial state update; unpopulated fields are left untouched by the
/// bridge.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
}

/// Wrap a hue value onto the bridge's hue circle.
pub fn normalize_hue(hue: i64) -> u16 {
    hue.rem_euclid(HUE_RANGE) as u16
}

/// Clamp brightness into the interval the bridge accepts.
pub fn clamp_brightness(brightness: i64) -> u8 {
    brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX) as u8
}

/// Client for one bridge, authenticated with an application key.
#[derive(Debug, Clone)]
pub struct HueBridge {
    client: reqwest::Client,
    base: String,
}

impl HueBridge {
    pub fn new(bridge_ip: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: format!("http://{bridge_ip}/api/{api_key}"),
        }
    }

    /// All lights known to the bridge, keyed by light id.
    pub async fn lights(&self) -> Result<HashMap<String, Light>, ServiceError> {
        let url = format!("{}/lights", self.base);
        let body = self.get_json(&url).await?;
        check_api_error(&body)?;
        serde_json::from_value(body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// One light by id.
    pub async fn light(&self, light_id: &str) -> Result<Light, ServiceError> {
        let url = format!("{}/lights/{light_id}", self.base);
        let body = self.get_json(&url).await?;
        check_api_error(&body)?;
        serde_json::from_value(body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Apply a partial state update to one light.
    pub async fn set_light_state(
        &self,
        light_id: &str,
        state: &StateUpdate,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/lights/{light_id}/state", self.base);
        let response = self
            .client
            .put(&url)
            .json(state)
            .send()
            .await
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        check_api_error(&body)?;
        debug!(light = light_id, ?state, "light state applied");
        Ok(())
    }

    /// Set a light's hue, wrapping into range and implicitly turning it on.
    pub async fn set_hue(&self, light_id: &str, hue: i64) -> Result<(), ServiceError> {
        self.set_light_state(
            light_id,
            &StateUpdate {
                on: Some(true),
                hue: Some(normalize_hue(hue)),
                ..StateUpdate::default()
            },
        )
        .await
    }

    /// Set the same brightness on several lights concurrently.
    ///
    /// Every light is attempted; the first failure is returned after all
    /// calls settle, the rest are logged.
    pub async fn set_brightness_multiple(
        &self,
        light_ids: &[String],
        brightness: i64,
    ) -> Result<(), ServiceError> {
        let clamped = clamp_brightness(brightness);
        let update = StateUpdate {
            on: Some(true),
            bri: Some(clamped),
            ..StateUpdate::default()
        };
        let results = futures::future::join_all(
            light_ids
                .iter()
                .map(|id| self.set_light_state(id, &update)),
        )
        .await;
        let mut first_error = None;
        for (id, result) in light_ids.iter().zip(results) {
            if let Err(e) = result {
                warn!(light = %id, "brightness update failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Turn a light on with full saturation so hue changes are visible.
    pub async fn enable_color_mode(&self, light_id: &str) -> Result<(), ServiceError> {
        self.set_light_state(
            light_id,
            &StateUpdate {
                on: Some(true),
                sat: Some(VIVID_SATURATION),
                ..StateUpdate::default()
            },
        )
        .await
    }

    /// Probe the bridge; returns the number of visible lights.
    pub async fn test_connection(&self) -> Result<usize, ServiceError> {
        Ok(self.lights().await?.len())
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// The bridge reports failures as `[{"error": {"description": ...}}]`
/// inside an HTTP 200. Surface the first such description.
fn check_api_error(body: &serde_json::Value) -> Result<(), ServiceError> {
    let items = match body {
        serde_json::Value::Array(items) => items.as_slice(),
        _ => return Ok(()),
    };
    for item in items {
        if let Some(error) = item.get("error") {
            let description = error
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("unknown bridge error");
            return Err(ServiceError::Api(description.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hue_wraps_both_directions() {
        assert_eq!(normalize_hue(0), 0);
        assert_eq!(normalize_hue(65535), 65535);
        assert_eq!(normalize_hue(65536), 0);
        assert_eq!(normalize_hue(70000), 4464);
        assert_eq!(normalize_hue(-1000), 64536);
        assert_eq!(normalize_hue(-65536), 0);
    }

    #[test]
    fn test_clamp_brightness_saturates() {
        assert_eq!(clamp_brightness(-50), 1);
        assert_eq!(clamp_brightness(0), 1);
        assert_eq!(clamp_brightness(1), 1);
        assert_eq!(clamp_brightness(127), 127);
        assert_eq!(clamp_brightness(254), 254);
        assert_eq!(clamp_brightness(10_000), 254);
    }

    #[test]
    fn test_state_update_serializes_only_populated_fields() {
        let update = StateUpdate {
            on: Some(true),
            hue: Some(12000),
            ..StateUpdate::default()
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json, serde_json::json!({"on": true, "hue": 12000}));
    }

    #[test]
    fn test_light_payload_decodes() {
        let json = serde_json::json!({
            "state": {"on": true, "bri": 200, "hue": 10000, "sat": 254, "alert": "none"},
            "name": "Desk bulb",
            "type": "Extended color light"
        });
        let light: Light = serde_json::from_value(json).expect("decode");
        assert!(light.state.on);
        assert_eq!(light.state.bri, Some(200));
        assert_eq!(light.state.hue, Some(10000));
        assert_eq!(light.name, "Desk bulb");
    }

    #[test]
    fn test_bridge_error_body_is_surfaced() {
        let body = serde_json::json!([
            {"error": {"type": 1, "description": "unauthorized user"}}
        ]);
        let err = check_api_error(&body).expect_err("must surface");
        assert!(matches!(err, ServiceError::Api(d) if d == "unauthorized user"));
    }

    #[test]
    fn test_success_body_passes() {
        let body = serde_json::json!([{"success": {"/lights/1/state/on": true}}]);
        assert!(check_api_error(&body).is_ok());
    }

    #[test]
    fn test_base_url_shape() {
        let bridge = HueBridge::new("192.168.1.10", "secret-key");
        assert_eq!(bridge.base, "http://192.168.1.10/api/secret-key");
    }
}
