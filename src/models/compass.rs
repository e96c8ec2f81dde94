//! Wire types for the Compass WiFi pool-heater cloud API.
//!
//! The API is a single JSON endpoint. Every request carries an `action`
//! discriminator and every response is an envelope with a `result` field
//! (`"success"` / `"failed"`), an optional `message` and an action-specific
//! payload.
//!
//! Notes
//! - `Device` is validated strictly: unknown or missing fields are errors.
//! - `DeviceDetail` and `DeviceState` only require the fields this crate reads
//!   and keep everything else in `extra` so a full snapshot can be dumped.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

// =====================
// Requests
// =====================

/// A single RPC call against the API endpoint.
#[derive(Serialize)]
#[serde(tag = "action")]
pub enum Action<'a> {
    #[serde(rename = "login")]
    Login { username: &'a str, password: &'a str },
    #[serde(rename = "getPasDevices")]
    GetPasDevices { token: &'a str },
    #[serde(rename = "thermostatGetDetail")]
    ThermostatGetDetail {
        token: &'a str,
        #[serde(rename = "thermostatKey")]
        thermostat_key: &'a str,
    },
}

impl Action<'_> {
    /// Wire name of the action. Safe to log, unlike the payload itself.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login { .. } => "login",
            Action::GetPasDevices { .. } => "getPasDevices",
            Action::ThermostatGetDetail { .. } => "thermostatGetDetail",
        }
    }
}

// =====================
// Response envelopes
// =====================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetailResponse {
    pub detail: DeviceDetail,
}

// =====================
// Devices
// =====================

/// A heater unit registered under the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Device {
    /// Stable key used for every later lookup of this unit.
    pub unique_key: String,
    pub name: String,
    pub model_name: String,
}

/// Full state snapshot of one device as returned by `thermostatGetDetail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    #[serde(rename = "currentState")]
    pub current_state: DeviceState,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Reported measured (water) temperature.
    #[serde(rename = "RMT")]
    pub rmt: f64,
    /// Unit flag: 0 = Fahrenheit, any other number = Celsius. Kept as sent.
    #[serde(rename = "CF")]
    pub cf: Number,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceState {
    pub fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::from_cf_flag(&self.cf)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    pub fn from_cf_flag(cf: &Number) -> Self {
        if cf.as_f64() == Some(0.0) {
            TemperatureUnit::Fahrenheit
        } else {
            TemperatureUnit::Celsius
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Celsius => "°C",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cf_zero_is_fahrenheit_anything_else_celsius() {
        assert_eq!(TemperatureUnit::from_cf_flag(&Number::from(0)), TemperatureUnit::Fahrenheit);
        assert_eq!(TemperatureUnit::from_cf_flag(&Number::from(1)), TemperatureUnit::Celsius);
        assert_eq!(TemperatureUnit::from_cf_flag(&Number::from(2)), TemperatureUnit::Celsius);
        assert_eq!(TemperatureUnit::from_cf_flag(&Number::from(-1)), TemperatureUnit::Celsius);
    }

    #[test]
    fn float_unit_flags_decode() {
        let celsius: DeviceDetail = serde_json::from_value(json!({"currentState": {"RMT": 82, "CF": 1.0}})).unwrap();
        assert_eq!(celsius.current_state.unit(), TemperatureUnit::Celsius);

        let fahrenheit: DeviceDetail =
            serde_json::from_value(json!({"currentState": {"RMT": 82, "CF": 0.0}})).unwrap();
        assert_eq!(fahrenheit.current_state.unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(fahrenheit.current_state.cf, Number::from_f64(0.0).unwrap());

        let not_a_number = serde_json::from_value::<DeviceDetail>(json!({"currentState": {"RMT": 82, "CF": "C"}}));
        assert!(not_a_number.is_err());
    }

    #[test]
    fn actions_serialize_with_discriminator() {
        let login = serde_json::to_value(Action::Login {
            username: "a",
            password: "b",
        })
        .unwrap();
        assert_eq!(login, json!({"action": "login", "username": "a", "password": "b"}));

        let detail = serde_json::to_value(Action::ThermostatGetDetail {
            token: "T1",
            thermostat_key: "k1",
        })
        .unwrap();
        assert_eq!(
            detail,
            json!({"action": "thermostatGetDetail", "token": "T1", "thermostatKey": "k1"})
        );
    }

    #[test]
    fn device_rejects_unknown_and_missing_fields() {
        let ok: Device = serde_json::from_value(json!({
            "unique_key": "k1",
            "name": "Pool",
            "model_name": "HP_50"
        }))
        .unwrap();
        assert_eq!(ok.unique_key, "k1");

        let unknown = serde_json::from_value::<Device>(json!({
            "unique_key": "k1",
            "name": "Pool",
            "model_name": "HP_50",
            "colour": "blue"
        }));
        assert!(unknown.is_err());

        let missing = serde_json::from_value::<Device>(json!({"unique_key": "k1", "name": "Pool"}));
        assert!(missing.is_err());
    }

    #[test]
    fn detail_keeps_extra_fields() {
        let detail: DeviceDetail = serde_json::from_value(json!({
            "currentState": {"RMT": 82, "CF": 0, "SP": 86},
            "firmware": "1.2.3"
        }))
        .unwrap();

        assert_eq!(detail.current_state.rmt, 82.0);
        assert_eq!(detail.current_state.unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(detail.current_state.extra.get("SP"), Some(&json!(86)));
        assert_eq!(detail.extra.get("firmware"), Some(&json!("1.2.3")));
    }

    #[test]
    fn detail_requires_reading_and_flag() {
        let no_rmt = serde_json::from_value::<DeviceDetail>(json!({"currentState": {"CF": 0}}));
        assert!(no_rmt.is_err());

        let no_state = serde_json::from_value::<DeviceDetail>(json!({"other": 1}));
        assert!(no_state.is_err());
    }
}
