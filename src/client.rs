//! Blocking HTTP client for the Compass WiFi pool-heater cloud API.
//!
//! - Blocking client using `ureq` (no async).
//! - Uses models in `crate::models::compass`.
//! - One endpoint, three actions: `login`, `getPasDevices`, `thermostatGetDetail`.
//!
//! Authentication
//! - `connect` trades username/password for a session token held by the client.
//! - The token is never refreshed. An expired token surfaces as a request failure.

use http::StatusCode;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::compass::*;

pub const COMPASS_URL: &str = "https://www.captouchwifi.com/icm/api/call";

const JSON_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json"), ("Accept", "application/json")];

#[derive(Debug)]
pub enum CompassClientError {
    /// Request never produced a response (DNS, TLS, refused, ...).
    Transport(String),
    /// Response status other than 200.
    Http { status: u16, body: String },
    /// Server answered `result: "failed"`.
    RequestFailed(String),
    /// Login was rejected.
    InvalidAuth(String),
    /// Body was not JSON or did not match the expected schema.
    Decode(String),
}

impl CompassClientError {
    /// Transport and status-level failures, as opposed to the server refusing a request.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, CompassClientError::Transport(_) | CompassClientError::Http { .. })
    }
}

impl core::fmt::Display for CompassClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CompassClientError::Transport(s) => write!(f, "cannot connect: {}", s),
            CompassClientError::Http { status, body } => write!(f, "cannot connect: http {}: {}", status, body),
            CompassClientError::RequestFailed(m) => write!(f, "request failed: {}", m),
            CompassClientError::InvalidAuth(m) => write!(f, "invalid auth: {}", m),
            CompassClientError::Decode(e) => write!(f, "decode error: {}", e),
        }
    }
}

impl std::error::Error for CompassClientError {}

impl From<ureq::Error> for CompassClientError {
    fn from(value: ureq::Error) -> Self {
        CompassClientError::Transport(value.to_string())
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for CompassClientError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = value.path().to_string();
        CompassClientError::Decode(format!("{} (at {})", value.into_inner(), path))
    }
}

pub struct CompassClient {
    agent: ureq::Agent,
    endpoint: String,
    /// Empty until `connect` succeeds.
    token: String,
}

impl Default for CompassClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompassClient {
    pub fn new() -> Self {
        Self::with_endpoint(COMPASS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        // Status handling is ours: a non-200 must still hand us the response.
        let agent: ureq::Agent = ureq::Agent::config_builder().http_status_as_error(false).build().into();

        CompassClient {
            agent,
            endpoint: endpoint.into(),
            token: String::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// POST one action and return the parsed envelope.
    ///
    /// Fails with a connection failure on any status other than 200 (body is
    /// not inspected), and with `RequestFailed` when the envelope's `result`
    /// is `"failed"`.
    pub fn post_request(&self, action: &Action<'_>, headers: &[(&str, &str)]) -> Result<Value, CompassClientError> {
        let payload = serde_json::to_string(action).map_err(|e| CompassClientError::Decode(e.to_string()))?;
        debug!("POST {} action={}", self.endpoint, action.name());

        let mut req = self.agent.post(self.endpoint.as_str());
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let mut res = req.send(payload.as_str())?;

        let status = res.status();
        let body = res.body_mut().read_to_string()?;
        if status != StatusCode::OK {
            return Err(CompassClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body).map_err(|e| CompassClientError::Decode(e.to_string()))?;
        if json.get("result").and_then(Value::as_str) == Some("failed") {
            let message = json
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("<no message>")
                .to_string();
            return Err(CompassClientError::RequestFailed(message));
        }
        debug!("action={} succeeded", action.name());
        Ok(json)
    }

    fn call<T: DeserializeOwned>(&self, action: &Action<'_>) -> Result<T, CompassClientError> {
        let json = self.post_request(action, JSON_HEADERS)?;
        Ok(serde_path_to_error::deserialize(json)?)
    }

    /// Log in and keep the returned session token.
    ///
    /// A `result: "failed"` answer becomes `InvalidAuth`. Connection failures
    /// keep their own kind.
    pub fn connect(&mut self, username: &str, password: &str) -> Result<(), CompassClientError> {
        let login: LoginResponse = self
            .call(&Action::Login { username, password })
            .map_err(|e| match e {
                CompassClientError::RequestFailed(m) => CompassClientError::InvalidAuth(m),
                other => other,
            })?;
        self.token = login.token;
        Ok(())
    }

    /// Devices in the order the server lists them.
    pub fn get_devices(&self) -> Result<Vec<Device>, CompassClientError> {
        let res: DevicesResponse = self.call(&Action::GetPasDevices { token: &self.token })?;
        Ok(res.devices)
    }

    pub fn get_device_detail(&self, key: &str) -> Result<DeviceDetail, CompassClientError> {
        let res: DetailResponse = self.call(&Action::ThermostatGetDetail {
            token: &self.token,
            thermostat_key: key,
        })?;
        Ok(res.detail)
    }

    /// Detail for every device, fetched one at a time in device-list order.
    /// The first failing fetch aborts the pass.
    pub fn get_device_details(&self) -> Result<Vec<DeviceDetail>, CompassClientError> {
        let devices = self.get_devices()?;
        let mut details = Vec::with_capacity(devices.len());
        for device in &devices {
            details.push(self.get_device_detail(&device.unique_key)?);
        }
        Ok(details)
    }
}
