//! Setup step for the pool-heater integration: validate credentials against
//! the cloud API and turn them into a config entry.

use log::{error, info};
use std::collections::BTreeMap;
use std::fmt;

use crate::client::{COMPASS_URL, CompassClient, CompassClientError};

pub const DOMAIN: &str = "compass_wifi_pool_heater";
pub const TITLE: &str = "Compass WiFi Pool Heater";
pub const DESCRIPTION: &str = "Integrate your Compass WiFi Pool Heater with Home Assistant.";

/// A field of the setup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub required: bool,
}

pub const STEP_USER_DATA_SCHEMA: &[FormField] = &[
    FormField {
        name: "username",
        required: true,
    },
    FormField {
        name: "password",
        required: true,
    },
];

#[derive(Clone, PartialEq, Eq)]
pub struct UserInput {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for UserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInput")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Persisted result of a completed setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub title: String,
    pub data: UserInput,
}

/// User-visible error codes shown on the form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FlowError {
    CannotConnect,
    InvalidAuth,
    Unknown,
}

impl FlowError {
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::CannotConnect => "cannot_connect",
            FlowError::InvalidAuth => "invalid_auth",
            FlowError::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowResult {
    ShowForm {
        step_id: &'static str,
        data_schema: &'static [FormField],
        errors: BTreeMap<&'static str, FlowError>,
    },
    CreateEntry(ConfigEntry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub title: &'static str,
    pub description: &'static str,
}

pub struct ConfigFlow {
    endpoint: String,
}

impl Default for ConfigFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFlow {
    pub fn new() -> Self {
        Self::with_endpoint(COMPASS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        ConfigFlow {
            endpoint: endpoint.into(),
        }
    }

    /// Log in with a throwaway client to prove the credentials work.
    pub fn validate_input(&self, input: &UserInput) -> Result<EntryInfo, CompassClientError> {
        let mut client = CompassClient::with_endpoint(self.endpoint.as_str());
        client.connect(&input.username, &input.password)?;
        Ok(EntryInfo {
            title: TITLE,
            description: DESCRIPTION,
        })
    }

    /// The one and only step. `None` means the form has not been submitted yet.
    pub fn step_user(&self, user_input: Option<UserInput>) -> FlowResult {
        let mut errors = BTreeMap::new();

        if let Some(input) = user_input {
            match self.validate_input(&input) {
                Ok(info) => {
                    info!("{} set up for {}: {}", info.title, input.username, info.description);
                    return FlowResult::CreateEntry(ConfigEntry {
                        title: info.title.to_string(),
                        data: input,
                    });
                }
                Err(e) => {
                    errors.insert("base", classify(&e));
                }
            }
        }

        FlowResult::ShowForm {
            step_id: "user",
            data_schema: STEP_USER_DATA_SCHEMA,
            errors,
        }
    }
}

fn classify(e: &CompassClientError) -> FlowError {
    match e {
        e if e.is_connection_failure() => FlowError::CannotConnect,
        CompassClientError::InvalidAuth(_) => FlowError::InvalidAuth,
        other => {
            error!("Unexpected exception during setup: {}", other);
            FlowError::Unknown
        }
    }
}
