//! Water-temperature sensor entities, one per heater on the account.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeSet;
use std::fmt;

use crate::client::{CompassClient, CompassClientError};
use crate::config_flow::{ConfigEntry, DOMAIN};
use crate::models::compass::{Device, DeviceDetail, TemperatureUnit};

pub const MANUFACTURER: &str = "Compass";

/// Device-registry metadata for the heater backing a sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifiers: BTreeSet<(String, String)>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
}

impl DeviceInfo {
    pub fn for_device(device: &Device) -> Self {
        DeviceInfo {
            identifiers: BTreeSet::from([(DOMAIN.to_string(), device.unique_key.clone())]),
            name: device.name.clone(),
            manufacturer: MANUFACTURER,
            model: device.model_name.replace('_', " "),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterTemperatureSensor {
    device_key: String,
    unique_id: String,
    device_info: DeviceInfo,
    native_value: Option<f64>,
    unit: Option<TemperatureUnit>,
    available: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl WaterTemperatureSensor {
    pub const NAME: &'static str = "Water Temperature";
    pub const DEVICE_CLASS: &'static str = "temperature";
    pub const STATE_CLASS: &'static str = "measurement";

    pub fn new(device: &Device) -> Self {
        WaterTemperatureSensor {
            device_key: device.unique_key.clone(),
            unique_id: format!("{}-water-temperature", device.unique_key),
            device_info: DeviceInfo::for_device(device),
            native_value: None,
            unit: None,
            available: true,
            last_updated: None,
        }
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn native_value(&self) -> Option<f64> {
        self.native_value
    }

    pub fn unit(&self) -> Option<TemperatureUnit> {
        self.unit
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Fetch this heater's detail and overwrite the displayed reading.
    pub fn update(&mut self, client: &CompassClient) -> Result<(), CompassClientError> {
        let detail = client.get_device_detail(&self.device_key)?;
        self.apply_detail(&detail);
        Ok(())
    }

    pub fn apply_detail(&mut self, detail: &DeviceDetail) {
        let state = &detail.current_state;
        self.native_value = Some(state.rmt);
        self.unit = Some(state.unit());
        self.available = true;
        self.last_updated = Some(Utc::now());
    }

    /// Keeps the last reading but reports the entity as unavailable.
    pub fn mark_unavailable(&mut self) {
        self.available = false;
    }
}

impl fmt::Display for WaterTemperatureSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.available {
            return f.write_str("unavailable");
        }
        match (self.native_value, self.unit) {
            (Some(value), Some(unit)) => write!(f, "{} {}", value, unit),
            _ => f.write_str("unknown"),
        }
    }
}

/// Entities of one config entry together with the client they poll through.
pub struct SensorPlatform {
    pub client: CompassClient,
    pub sensors: Vec<WaterTemperatureSensor>,
}

impl SensorPlatform {
    /// Refresh every sensor once. Returns how many refreshes failed.
    pub fn refresh(&mut self) -> usize {
        let mut failed = 0;
        for sensor in &mut self.sensors {
            match sensor.update(&self.client) {
                Ok(()) => info!("{} {}: {}", sensor.device_info.name, WaterTemperatureSensor::NAME, sensor),
                Err(e) => {
                    warn!("{} refresh failed: {}", sensor.unique_id, e);
                    sensor.mark_unavailable();
                    failed += 1;
                }
            }
        }
        failed
    }
}

/// Log in with the entry's credentials, create one sensor per heater and
/// refresh each before handing the platform back.
pub fn setup_entry(mut client: CompassClient, entry: &ConfigEntry) -> Result<SensorPlatform, CompassClientError> {
    client.connect(&entry.data.username, &entry.data.password)?;
    let devices = client.get_devices()?;
    info!("Discovered {} heater(s) for '{}'", devices.len(), entry.title);

    let sensors: Vec<WaterTemperatureSensor> = devices.iter().map(WaterTemperatureSensor::new).collect();
    for sensor in &sensors {
        info!(
            "Registering {} ({}, {}) for {} [{}]",
            sensor.unique_id,
            WaterTemperatureSensor::DEVICE_CLASS,
            WaterTemperatureSensor::STATE_CLASS,
            sensor.device_info.name,
            sensor.device_info.model
        );
    }
    let mut platform = SensorPlatform { client, sensors };
    platform.refresh();
    Ok(platform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{endpoint, mock_action};
    use crate::config_flow::UserInput;
    use mockito::Server;
    use serde_json::json;

    fn device() -> Device {
        Device {
            unique_key: "abc123".to_string(),
            name: "Backyard Pool".to_string(),
            model_name: "ICM_HP_50".to_string(),
        }
    }

    fn detail(value: serde_json::Value) -> DeviceDetail {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn metadata_from_device() {
        let sensor = WaterTemperatureSensor::new(&device());
        assert_eq!(sensor.unique_id(), "abc123-water-temperature");
        assert_eq!(sensor.device_key(), "abc123");

        let info = sensor.device_info();
        assert_eq!(info.name, "Backyard Pool");
        assert_eq!(info.manufacturer, "Compass");
        assert_eq!(info.model, "ICM HP 50");
        assert!(info.identifiers.contains(&(DOMAIN.to_string(), "abc123".to_string())));
        assert_eq!(sensor.to_string(), "unknown");
        assert_eq!(WaterTemperatureSensor::DEVICE_CLASS, "temperature");
        assert_eq!(WaterTemperatureSensor::STATE_CLASS, "measurement");
    }

    #[test]
    fn fahrenheit_reading() {
        let mut sensor = WaterTemperatureSensor::new(&device());
        sensor.apply_detail(&detail(json!({"currentState": {"RMT": 82, "CF": 0}})));
        assert_eq!(sensor.native_value(), Some(82.0));
        assert_eq!(sensor.unit(), Some(TemperatureUnit::Fahrenheit));
        assert_eq!(sensor.to_string(), "82 °F");
        assert!(sensor.last_updated().is_some());
    }

    #[test]
    fn each_refresh_overwrites_reading_and_unit() {
        let mut sensor = WaterTemperatureSensor::new(&device());
        sensor.apply_detail(&detail(json!({"currentState": {"RMT": 82, "CF": 0}})));
        sensor.apply_detail(&detail(json!({"currentState": {"RMT": 27.5, "CF": 1}})));
        assert_eq!(sensor.to_string(), "27.5 °C");
    }

    #[test]
    fn unavailable_until_next_success() {
        let mut sensor = WaterTemperatureSensor::new(&device());
        sensor.apply_detail(&detail(json!({"currentState": {"RMT": 80, "CF": 0}})));
        sensor.mark_unavailable();
        assert!(!sensor.available());
        assert_eq!(sensor.to_string(), "unavailable");
        assert_eq!(sensor.native_value(), Some(80.0));

        sensor.apply_detail(&detail(json!({"currentState": {"RMT": 81, "CF": 0}})));
        assert!(sensor.available());
    }

    #[test]
    fn setup_entry_refreshes_before_returning() {
        let mut server = Server::new();
        let _login = mock_action(
            &mut server,
            json!({"action": "login", "username": "a", "password": "b"}),
            200,
            json!({"result": "success", "token": "T1"}),
        )
        .create();
        let _devices = mock_action(
            &mut server,
            json!({"action": "getPasDevices", "token": "T1"}),
            200,
            json!({"result": "success", "devices": [
                {"unique_key": "k1", "name": "Pool", "model_name": "HP_50"},
                {"unique_key": "k2", "name": "Spa", "model_name": "HP_20"},
            ]}),
        )
        .create();
        let _k1 = mock_action(
            &mut server,
            json!({"action": "thermostatGetDetail", "thermostatKey": "k1", "token": "T1"}),
            200,
            json!({"result": "success", "detail": {"currentState": {"RMT": 82, "CF": 0}}}),
        )
        .create();
        let _k2 = mock_action(
            &mut server,
            json!({"action": "thermostatGetDetail", "thermostatKey": "k2"}),
            200,
            json!({"result": "failed", "message": "device offline"}),
        )
        .create();

        let entry = ConfigEntry {
            title: "Compass WiFi Pool Heater".to_string(),
            data: UserInput {
                username: "a".to_string(),
                password: "b".to_string(),
            },
        };
        let mut platform = setup_entry(CompassClient::with_endpoint(endpoint(&server)), &entry).unwrap();

        assert_eq!(platform.client.token(), "T1");
        let shown: Vec<String> = platform.sensors.iter().map(|s| s.to_string()).collect();
        assert_eq!(shown, vec!["82 °F", "unavailable"]);

        assert_eq!(platform.refresh(), 1);
    }

    #[test]
    fn setup_entry_propagates_rejected_login() {
        let mut server = Server::new();
        let _login = mock_action(
            &mut server,
            json!({"action": "login"}),
            200,
            json!({"result": "failed", "message": "password changed"}),
        )
        .create();

        let entry = ConfigEntry {
            title: "Compass WiFi Pool Heater".to_string(),
            data: UserInput {
                username: "a".to_string(),
                password: "old".to_string(),
            },
        };
        let err = setup_entry(CompassClient::with_endpoint(endpoint(&server)), &entry)
            .err()
            .unwrap();
        assert!(matches!(err, CompassClientError::InvalidAuth(_)));
    }
}
